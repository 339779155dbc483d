//! HTTP surface: shared state, guards and route handlers.

pub mod guards;
pub mod router;
pub mod routes;

pub use router::{YoddaState, yodda_router};

pub mod auth;
pub mod build;
pub mod config;
pub mod db;
pub mod error;
pub mod licensing;
pub mod orchestrator;
pub mod providers;
pub mod quota;
pub mod server;
pub mod store;

pub use error::YoddaError;
pub use orchestrator::{BuildReport, Orchestrator};
pub use server::{YoddaState, yodda_router};
pub use store::{MemoryStore, UserStore};

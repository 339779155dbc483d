//! Database module: SQLite persistence for users, plugins and licenses.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `actor.rs`: the actor owning the pool, and its [`crate::store::UserStore`] handle

pub mod actor;
pub mod models;
pub mod schema;

pub use models::{DbLicense, DbPlugin, DbUser};
pub use schema::SQLITE_INIT;

pub use actor::{DbActorHandle, spawn};

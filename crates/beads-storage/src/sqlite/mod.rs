//! SQLite-backed storage implementation.

mod comments;
mod config;
mod dependencies;
mod dirty;
mod issues;
mod labels;
mod queries;
pub mod schema;
mod store;
mod tombstone;
mod transaction;

pub use store::SqliteStore;

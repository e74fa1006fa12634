//! SQLite-backed implementation of the practice store.

pub mod db;
pub mod errors;
mod models;
pub mod schema;
pub mod store;

pub use db::{bootstrap_schema, create_pool, get_connection, DbPool, WriteHandle};
pub use errors::StorageError;
pub use store::SqliteStore;

//! SQLite backend for the Zeitgeist event log.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. The symbol and event caches
//! live beside the connection and are only touched from that thread.

mod cache;
mod compile;
mod encode;
mod engine;
mod order;
mod schema;
mod store;
mod symbol;
mod where_clause;

pub mod error;

pub use cache::DEFAULT_CACHE_SIZE;
pub use engine::{DEFAULT_RELATED_WINDOW, StoreOptions};
pub use error::{Error, Result};
pub use schema::SCHEMA_VERSION;
pub use store::SqliteStore;

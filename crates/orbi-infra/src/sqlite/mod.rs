//! SQLite storage layer.
//!
//! The message store backed by SQLite with WAL mode and split read/write
//! connection pools.

pub mod chat;
pub mod pool;

pub use chat::SqliteMessageStore;
pub use pool::{DatabasePool, database_url};

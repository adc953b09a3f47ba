//! SQLite storage layer
//!
//! - Connection pooling (r2d2-sqlite) with per-connection pragmas
//! - Transaction helper with rollback on error
//! - Forward-only schema migrations tracked in `PRAGMA user_version`

pub mod connection;
pub mod migrations;
pub mod transactions;

pub use connection::{DbPool, initialize_pool, open_in_memory};
pub use migrations::{SCHEMA_VERSION, migrate_to_latest, schema_version};
pub use transactions::execute_in_transaction;

/// Database module result type
pub type Result<T> = std::result::Result<T, DbError>;

/// Database error types
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Migration error: {0}")]
    Migration(String),
}

impl From<r2d2::Error> for DbError {
    fn from(err: r2d2::Error) -> Self {
        Self::Pool(err.to_string())
    }
}

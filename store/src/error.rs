//! Unified error handling for the store engine.

use thiserror::Error;

/// Application error type for storage operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Query(#[from] stash_query::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("error marshalling data for table {table}: {source}")]
    Marshal {
        table: String,
        source: serde_json::Error,
    },

    #[error("error decoding payload from table {table}: {source}")]
    Unmarshal {
        table: String,
        source: serde_json::Error,
    },

    #[error("entry {id} not found in table {table}")]
    NotFound { table: String, id: i64 },

    #[error("entry {filter} not found in table {table}")]
    NotFoundByFilter { table: String, filter: String },

    #[error("entry {id} not found or concurrently updated in table {table}")]
    UpdateConflict { table: String, id: i64 },

    #[error("select limit {limit} exceeds max limit {max}")]
    LimitExceeded { limit: i64, max: i64 },

    #[error("select offset {0} is invalid")]
    InvalidOffset(i64),

    #[error("no transaction to {0}")]
    NoTransaction(&'static str),

    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("invalid database type: {0}")]
    UnsupportedDriver(String),

    #[error("error creating table {table}: {source}")]
    CreateTable { table: String, source: sqlx::Error },

    #[error("error creating index on {table}: {source}")]
    CreateIndex { table: String, source: sqlx::Error },

    #[error("error generating index columns for table {table}: {source}")]
    IndexColumns {
        table: String,
        source: stash_query::Error,
    },
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

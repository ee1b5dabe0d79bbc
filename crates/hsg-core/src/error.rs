//! Error kinds for the HSG engine.
//!
//! One variant per semantic failure mode callers need to distinguish:
//! `Validation`, `NotFound`, `Forbidden`, `RateLimit`, `Storage`,
//! `Embedding`, `Transient`.

/// Result type used throughout the engine
pub type Result<T> = std::result::Result<T, HsgError>;

/// Engine-wide error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum HsgError {
    /// Bad input: unknown sector, malformed filters, invalid k, etc.
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced memory id does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation not permitted for the given namespace
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Concurrent query admission cap exceeded
    #[error("rate limit: {0}")]
    RateLimit(String),

    /// Metadata store or vector repository failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Embedding provider failed after exhausting its retry budget
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Transient condition; caller may retry
    #[error("transient error: {0}")]
    Transient(String),
}

/// Metadata / vector repository failure detail
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Underlying SQLite error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// I/O failure (db file, index persistence)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Initialization failure (schema, directories, pools)
    #[error("initialization error: {0}")]
    Init(String),
    /// A nested transaction was attempted
    #[error("nested transaction")]
    NestedTransaction,
}

impl From<rusqlite::Error> for HsgError {
    fn from(e: rusqlite::Error) -> Self {
        HsgError::Storage(StorageError::Database(e))
    }
}

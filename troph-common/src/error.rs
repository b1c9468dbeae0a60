//! Common error types for the prefilter

use thiserror::Error;

/// Common result type for prefilter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the prefilter crates
#[derive(Error, Debug)]
pub enum Error {
    /// Tracking database error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip container could not be read or written
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Row sequence could not be serialized
    #[error("Encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Row sequence could not be deserialized
    #[error("Decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid caller input (malformed name, bad date range, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An identifier does not fit its persisted integer width
    #[error("Schema violation: {column} value {value} exceeds its integer width")]
    SchemaViolation { column: &'static str, value: u64 },

    /// Frame metadata did not cover every requested frame id
    #[error("Metadata mismatch: {0}")]
    MetadataMismatch(String),

    /// Blocking worker task failed to complete
    #[error("Worker error: {0}")]
    Worker(String),
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Worker(err.to_string())
    }
}

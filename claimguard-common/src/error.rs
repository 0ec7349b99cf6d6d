//! Common error types for ClaimGuard

use thiserror::Error;

/// Common result type for ClaimGuard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the ClaimGuard pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required persisted input has not been generated or built yet
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Stored data is missing expected tables or columns
    #[error("Schema error: {0}")]
    Schema(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Retrieval collaborator failed or timed out
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for failures caused by inputs that have not been produced yet
    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, Error::DataUnavailable(_))
    }
}

//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid object id: {0}")]
    InvalidObjectId(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

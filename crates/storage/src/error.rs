//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object too large: exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("no free object path after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

//! Metadata index error types.

use depot_core::{ContentHash, ObjectId};
use std::path::PathBuf;
use thiserror::Error;

/// Metadata index operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("content hash {hash} is already stored as {existing}")]
    DuplicateHash {
        hash: ContentHash,
        existing: ObjectId,
    },

    #[error("object id {0} already exists")]
    DuplicateId(ObjectId),

    #[error("metadata index {} is corrupt: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record cannot be stored: {0}")]
    InvalidRecord(String),
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

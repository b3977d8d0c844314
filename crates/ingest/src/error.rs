//! Ingest error types.

use depot_core::{ObjectRecord, Rejection};
use depot_metadata::MetadataError;
use depot_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the ingest pipeline and the [`Depot`](crate::Depot) facade.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported file type for '{filename}': {reason}")]
    UnsupportedType { filename: String, reason: Rejection },

    #[error("content already stored as {} ({})", .existing.id, .existing.original_name)]
    DuplicateContent { existing: Box<ObjectRecord> },

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("upload exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("invalid configuration: {0}")]
    Config(#[from] depot_core::Error),

    #[error(transparent)]
    Storage(StorageError),

    #[error(transparent)]
    Index(#[from] MetadataError),

    #[error("commit task failed: {0}")]
    Interrupted(#[from] tokio::task::JoinError),
}

impl From<StorageError> for IngestError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::TooLarge { limit } => IngestError::TooLarge { limit },
            other => IngestError::Storage(other),
        }
    }
}

impl IngestError {
    /// The already-stored record, for duplicate uploads.
    pub fn existing_record(&self) -> Option<&ObjectRecord> {
        match self {
            IngestError::DuplicateContent { existing } => Some(existing),
            _ => None,
        }
    }
}

/// Result type for ingest operations.
pub type IngestResult<T> = std::result::Result<T, IngestError>;

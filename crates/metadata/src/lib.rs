//! Metadata index for Depot.
//!
//! Maps object ids to their records and answers "is this content already
//! stored?" by hash. Two backends share the [`MetadataIndex`] trait:
//! - [`JsonFileIndex`]: the whole index in one JSON document
//! - [`SqliteIndex`]: a single `objects` table

pub mod error;
pub mod index;
pub mod json;
pub mod models;
pub mod sqlite;

pub use error::{MetadataError, MetadataResult};
pub use index::MetadataIndex;
pub use json::JsonFileIndex;
pub use sqlite::SqliteIndex;

use depot_core::config::IndexConfig;
use std::sync::Arc;

/// Create a metadata index from configuration.
pub async fn from_config(config: &IndexConfig) -> MetadataResult<Arc<dyn MetadataIndex>> {
    match config {
        IndexConfig::Json { path } => {
            let index = JsonFileIndex::open(path).await?;
            Ok(Arc::new(index) as Arc<dyn MetadataIndex>)
        }
        IndexConfig::Sqlite {
            path,
            busy_timeout_secs,
        } => {
            let index = SqliteIndex::open(path, *busy_timeout_secs).await?;
            Ok(Arc::new(index) as Arc<dyn MetadataIndex>)
        }
    }
}

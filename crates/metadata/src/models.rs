//! Database rows for the SQLite index.

use crate::error::{MetadataError, MetadataResult};
use depot_core::record::{format_timestamp, parse_timestamp};
use depot_core::{ContentHash, ObjectId, ObjectRecord};
use sqlx::FromRow;
use std::path::{Path, PathBuf};

/// One row of the `objects` table.
///
/// Columns carry the same names and text encodings as the JSON document.
#[derive(Debug, Clone, FromRow)]
pub struct ObjectRow {
    pub uuid: String,
    pub original_name: String,
    pub upload_date: String,
    pub server_path: String,
    pub extension: String,
    pub hash: String,
}

impl ObjectRow {
    pub fn from_record(record: &ObjectRecord) -> MetadataResult<Self> {
        let upload_date = format_timestamp(&record.created_at)
            .map_err(|e| MetadataError::InvalidRecord(format!("upload_date: {e}")))?;
        Ok(Self {
            uuid: record.id.to_string(),
            original_name: record.original_name.clone(),
            upload_date,
            server_path: record.stored_path.to_string_lossy().into_owned(),
            extension: record.extension.clone(),
            hash: record.content_hash.to_hex(),
        })
    }

    /// Decode into a record; `db` names the database in corruption errors.
    pub fn into_record(self, db: &Path) -> MetadataResult<ObjectRecord> {
        let corrupt = |reason: String| MetadataError::Corrupt {
            path: db.to_path_buf(),
            reason: format!("row {}: {reason}", self.uuid),
        };
        let id = ObjectId::new(self.uuid.as_str()).map_err(|e| corrupt(e.to_string()))?;
        let created_at = parse_timestamp(&self.upload_date).map_err(|e| corrupt(e.to_string()))?;
        let content_hash = ContentHash::from_hex(&self.hash).map_err(|e| corrupt(e.to_string()))?;
        Ok(ObjectRecord {
            id,
            original_name: self.original_name,
            created_at,
            stored_path: PathBuf::from(self.server_path),
            extension: self.extension,
            content_hash,
        })
    }
}

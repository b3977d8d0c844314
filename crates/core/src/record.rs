//! The per-object metadata record.

use crate::hash::ContentHash;
use crate::object_id::ObjectId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, PrimitiveDateTime};

/// One entry per accepted upload.
///
/// Field names on the wire (`uuid`, `original_name`, `upload_date`,
/// `server_path`, `extension`, `hash`) are the persisted metadata layout and
/// must not change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    #[serde(rename = "uuid")]
    pub id: ObjectId,
    /// Name supplied by the uploader. Never used to build filesystem paths.
    pub original_name: String,
    #[serde(rename = "upload_date", with = "upload_date")]
    pub created_at: OffsetDateTime,
    #[serde(rename = "server_path")]
    pub stored_path: PathBuf,
    pub extension: String,
    #[serde(rename = "hash")]
    pub content_hash: ContentHash,
}

impl ObjectRecord {
    /// Build a record stamped with the current time.
    pub fn new(
        id: ObjectId,
        original_name: impl Into<String>,
        stored_path: impl Into<PathBuf>,
        extension: impl Into<String>,
        content_hash: ContentHash,
    ) -> Self {
        Self {
            id,
            original_name: original_name.into(),
            created_at: OffsetDateTime::now_utc(),
            stored_path: stored_path.into(),
            extension: extension.into(),
            content_hash,
        }
    }
}

/// Parse an upload timestamp.
///
/// RFC 3339 is the written form. Naive ISO-8601 timestamps without an offset
/// are accepted as UTC.
pub fn parse_timestamp(s: &str) -> crate::Result<OffsetDateTime> {
    if let Ok(ts) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(ts);
    }
    PrimitiveDateTime::parse(s, &Iso8601::DEFAULT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|e| crate::Error::InvalidTimestamp(format!("{s}: {e}")))
}

/// Format an upload timestamp as RFC 3339.
pub fn format_timestamp(ts: &OffsetDateTime) -> crate::Result<String> {
    ts.format(&Rfc3339)
        .map_err(|e| crate::Error::InvalidTimestamp(e.to_string()))
}

mod upload_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;

    pub fn serialize<S: Serializer>(ts: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        let s = super::format_timestamp(ts).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_timestamp(&s).map_err(serde::de::Error::custom)
    }
}

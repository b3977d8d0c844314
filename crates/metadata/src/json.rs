//! Single JSON document index.
//!
//! The whole index lives in one JSON object keyed by object id. Every
//! mutation rewrites the document to a temporary sibling, syncs it, and
//! renames it over the original, so readers of the file only ever see a
//! complete document. The in-memory map is only replaced after the rename,
//! and the write finishes even if the caller stops waiting for it.

use crate::error::{MetadataError, MetadataResult};
use crate::index::MetadataIndex;
use async_trait::async_trait;
use depot_core::{ContentHash, ObjectId, ObjectRecord};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, info, instrument, warn};

/// In-memory view of the index with a hash lookup kept in step.
#[derive(Clone, Debug, Default)]
struct RecordMap {
    by_id: HashMap<ObjectId, ObjectRecord>,
    by_hash: HashMap<ContentHash, ObjectId>,
}

impl RecordMap {
    fn insert(&mut self, record: ObjectRecord) -> MetadataResult<()> {
        if let Some(existing) = self.by_hash.get(&record.content_hash) {
            return Err(MetadataError::DuplicateHash {
                hash: record.content_hash,
                existing: existing.clone(),
            });
        }
        if self.by_id.contains_key(&record.id) {
            return Err(MetadataError::DuplicateId(record.id));
        }
        self.by_hash
            .insert(record.content_hash, record.id.clone());
        self.by_id.insert(record.id.clone(), record);
        Ok(())
    }

    fn remove(&mut self, id: &ObjectId) -> Option<ObjectRecord> {
        let record = self.by_id.remove(id)?;
        self.by_hash.remove(&record.content_hash);
        Some(record)
    }

    fn lookup_by_hash(&self, hash: &ContentHash) -> Option<&ObjectRecord> {
        self.by_hash.get(hash).and_then(|id| self.by_id.get(id))
    }

    /// Render the document: keys sorted, four-space indent.
    fn to_document(&self) -> MetadataResult<Vec<u8>> {
        let sorted: BTreeMap<&str, &ObjectRecord> = self
            .by_id
            .iter()
            .map(|(id, record)| (id.as_str(), record))
            .collect();

        let mut buf = Vec::with_capacity(256 * sorted.len().max(1));
        let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        sorted.serialize(&mut ser)?;
        buf.push(b'\n');
        Ok(buf)
    }
}

/// Metadata index stored as one JSON file.
#[derive(Debug)]
pub struct JsonFileIndex {
    path: PathBuf,
    state: Arc<RwLock<RecordMap>>,
}

impl JsonFileIndex {
    /// Open the index at `path`, creating parent directories as needed.
    ///
    /// A missing or blank file yields an empty index. Anything else that does
    /// not parse into a consistent set of records is reported as `Corrupt`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let state = match fs::read(&path).await {
            Ok(bytes) => parse_document(&path, &bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("metadata file absent, starting empty");
                RecordMap::default()
            }
            Err(e) => return Err(e.into()),
        };

        info!(records = state.by_id.len(), "loaded JSON metadata index");
        Ok(Self {
            path,
            state: Arc::new(RwLock::new(state)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `next` to disk, then make it the live map.
    async fn commit(
        &self,
        mut live: OwnedRwLockWriteGuard<RecordMap>,
        next: RecordMap,
    ) -> MetadataResult<()> {
        let document = next.to_document()?;
        let path = self.path.clone();
        let tmp = self.temp_path();

        let task = tokio::spawn(async move {
            write_document(&path, &tmp, &document).await?;
            *live = next;
            Ok::<_, MetadataError>(())
        });
        task.await
            .map_err(|e| MetadataError::Io(std::io::Error::other(e)))?
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "metadata".to_string());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
    }
}

async fn write_document(path: &Path, tmp: &Path, document: &[u8]) -> MetadataResult<()> {
    if let Err(e) = write_synced(tmp, document).await {
        let _ = fs::remove_file(tmp).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(tmp, path).await {
        let _ = fs::remove_file(tmp).await;
        return Err(e.into());
    }

    #[cfg(unix)]
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        // Persist the rename itself.
        let synced = match fs::File::open(parent).await {
            Ok(dir) => dir.sync_all().await,
            Err(e) => Err(e),
        };
        if let Err(e) = synced {
            warn!(error = %e, "failed to sync metadata directory");
        }
    }
    Ok(())
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

fn parse_document(path: &Path, bytes: &[u8]) -> MetadataResult<RecordMap> {
    let corrupt = |reason: String| MetadataError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(RecordMap::default());
    }

    let raw: BTreeMap<String, ObjectRecord> =
        serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;

    let mut state = RecordMap::default();
    for (key, record) in raw {
        if key != record.id.as_str() {
            return Err(corrupt(format!(
                "entry {key} holds a record for {}",
                record.id
            )));
        }
        state.insert(record).map_err(|e| corrupt(e.to_string()))?;
    }
    Ok(state)
}

#[async_trait]
impl MetadataIndex for JsonFileIndex {
    async fn lookup_by_hash(&self, hash: &ContentHash) -> MetadataResult<Option<ObjectRecord>> {
        Ok(self.state.read().await.lookup_by_hash(hash).cloned())
    }

    async fn get(&self, id: &ObjectId) -> MetadataResult<Option<ObjectRecord>> {
        Ok(self.state.read().await.by_id.get(id).cloned())
    }

    #[instrument(skip(self, record), fields(backend = "json", object_id = %record.id))]
    async fn insert(&self, record: &ObjectRecord) -> MetadataResult<()> {
        let live = self.state.clone().write_owned().await;
        let mut next = (*live).clone();
        next.insert(record.clone())?;

        if let Err(e) = self.commit(live, next).await {
            warn!(id = %record.id, error = %e, "metadata flush failed, insert not applied");
            return Err(e);
        }
        debug!(id = %record.id, hash = %record.content_hash, "record inserted");
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "json"))]
    async fn remove(&self, id: &ObjectId) -> MetadataResult<Option<ObjectRecord>> {
        let live = self.state.clone().write_owned().await;
        let mut next = (*live).clone();
        let Some(record) = next.remove(id) else {
            return Ok(None);
        };

        if let Err(e) = self.commit(live, next).await {
            warn!(%id, error = %e, "metadata flush failed, removal not applied");
            return Err(e);
        }
        debug!(%id, "record removed");
        Ok(Some(record))
    }

    async fn all(&self) -> MetadataResult<Vec<ObjectRecord>> {
        Ok(self.state.read().await.by_id.values().cloned().collect())
    }

    async fn count(&self) -> MetadataResult<usize> {
        Ok(self.state.read().await.by_id.len())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::metadata(parent).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "json"
    }
}

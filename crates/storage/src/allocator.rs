//! Sharded path allocation for new objects.

use crate::error::{StorageError, StorageResult};
use depot_core::ObjectId;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::instrument;

/// Source of fresh identifiers.
pub type IdSource = Arc<dyn Fn() -> ObjectId + Send + Sync>;

/// A reserved location for a new object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    pub id: ObjectId,
    pub path: PathBuf,
}

/// Derives `<root>/<s1>/<s2>/<id>.<ext>` locations from fresh random ids.
///
/// `s1` and `s2` are the first and second hex pairs of the id, which keeps
/// any single directory at roughly 1/65536 of the objects.
pub struct PathAllocator {
    root: PathBuf,
    max_attempts: u32,
    id_source: IdSource,
}

impl PathAllocator {
    /// Create an allocator rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl AsRef<Path>, max_attempts: u32) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            max_attempts: max_attempts.max(1),
            id_source: Arc::new(ObjectId::generate),
        })
    }

    /// Replace the id generator.
    pub fn with_id_source(mut self, id_source: IdSource) -> Self {
        self.id_source = id_source;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final location for `id` with `extension`. Does not touch the filesystem.
    pub fn object_path(&self, id: &ObjectId, extension: &str) -> PathBuf {
        let (level1, level2) = id.shard();
        let file_name = if extension.is_empty() {
            id.to_string()
        } else {
            format!("{id}.{extension}")
        };
        self.root.join(level1).join(level2).join(file_name)
    }

    /// Reserve a fresh id and a path that does not exist yet.
    ///
    /// Shard directories are created as a side effect.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn allocate(&self, extension: &str) -> StorageResult<Allocation> {
        if !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StorageError::InvalidPath(format!(
                "extension contains unsafe characters: {extension}"
            )));
        }

        for attempt in 1..=self.max_attempts {
            let id = (self.id_source)();
            let path = self.object_path(&id, extension);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            if fs::try_exists(&path).await? {
                tracing::warn!(
                    object_id = %id,
                    attempt,
                    "Allocated object path already exists, retrying with a new id"
                );
                continue;
            }
            tracing::debug!(object_id = %id, path = %path.display(), "Object path allocated");
            return Ok(Allocation { id, path });
        }

        Err(StorageError::AllocationExhausted {
            attempts: self.max_attempts,
        })
    }
}

impl fmt::Debug for PathAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathAllocator")
            .field("root", &self.root)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

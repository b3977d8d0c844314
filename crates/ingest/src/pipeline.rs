//! The per-upload ingest state machine.

use crate::error::{IngestError, IngestResult};
use crate::locks::HashLocks;
use depot_core::{ExtensionPolicy, ObjectRecord};
use depot_metadata::MetadataIndex;
use depot_storage::{Allocation, ByteStream, HashStore, PathAllocator, PlacedObject, StagingArea};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where an upload is in the pipeline.
///
/// `Received → Staged → HashComputed → (Duplicate | Allocated) → Committed`,
/// with `Rejected` reachable from `Received` and `Staged`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestStage {
    Received,
    Staged,
    HashComputed,
    Duplicate,
    Allocated,
    Committed,
    Rejected,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestStage::Received => "received",
            IngestStage::Staged => "staged",
            IngestStage::HashComputed => "hash_computed",
            IngestStage::Duplicate => "duplicate",
            IngestStage::Allocated => "allocated",
            IngestStage::Committed => "committed",
            IngestStage::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful ingest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ingested {
    /// A new object was stored.
    Created(ObjectRecord),
    /// Identical content was already stored; nothing was written.
    Existing(ObjectRecord),
}

impl Ingested {
    pub fn record(&self) -> &ObjectRecord {
        match self {
            Ingested::Created(record) | Ingested::Existing(record) => record,
        }
    }

    pub fn into_record(self) -> ObjectRecord {
        match self {
            Ingested::Created(record) | Ingested::Existing(record) => record,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Ingested::Created(_))
    }
}

/// Turns an upload stream into a committed object, or into nothing at all.
pub struct IngestPipeline {
    policy: ExtensionPolicy,
    staging: StagingArea,
    hasher: HashStore,
    allocator: PathAllocator,
    index: Arc<dyn MetadataIndex>,
    locks: HashLocks,
    max_object_bytes: Option<u64>,
}

impl IngestPipeline {
    pub fn new(
        policy: ExtensionPolicy,
        staging: StagingArea,
        hasher: HashStore,
        allocator: PathAllocator,
        index: Arc<dyn MetadataIndex>,
    ) -> Self {
        Self {
            policy,
            staging,
            hasher,
            allocator,
            index,
            locks: HashLocks::new(),
            max_object_bytes: None,
        }
    }

    /// Reject uploads larger than `limit` bytes while staging.
    pub fn with_max_object_bytes(mut self, limit: Option<u64>) -> Self {
        self.max_object_bytes = limit;
        self
    }

    pub fn index(&self) -> &Arc<dyn MetadataIndex> {
        &self.index
    }

    pub fn hasher(&self) -> &HashStore {
        &self.hasher
    }

    pub fn allocator(&self) -> &PathAllocator {
        &self.allocator
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub fn locks(&self) -> &HashLocks {
        &self.locks
    }

    /// Run one upload through every stage.
    ///
    /// Identical content already in the index yields [`Ingested::Existing`].
    /// On any error no record is created and no file is left behind. Once a
    /// path is allocated the commit runs as its own task, so dropping the
    /// returned future cannot strand a file that the index never learns of.
    pub async fn run(&self, filename: &str, content: ByteStream) -> IngestResult<Ingested> {
        debug!(stage = %IngestStage::Received, filename, "ingest started");

        let extension = self.policy.check(filename).map_err(|reason| {
            debug!(stage = %IngestStage::Rejected, filename, %reason, "upload refused");
            IngestError::UnsupportedType {
                filename: filename.to_string(),
                reason,
            }
        })?;

        let staged = match self.staging.stage(content, self.max_object_bytes).await {
            Ok(staged) => staged,
            Err(e) => {
                debug!(stage = %IngestStage::Rejected, filename, error = %e, "staging failed");
                return Err(e.into());
            }
        };
        debug!(stage = %IngestStage::Staged, size = staged.size(), "content staged");

        let hash = self.hasher.digest_file(staged.path()).await?;
        debug!(stage = %IngestStage::HashComputed, %hash, "content hashed");

        // Duplicate check through commit is one critical section per hash.
        let guard = self.locks.lock(hash).await;

        if let Some(existing) = self.index.lookup_by_hash(&hash).await? {
            debug!(stage = %IngestStage::Duplicate, existing = %existing.id, "content already stored");
            if let Err(e) = staged.discard().await {
                warn!(error = %e, "failed to discard staged duplicate");
            }
            return Ok(Ingested::Existing(existing));
        }

        let Allocation { id, path } = self.allocator.allocate(&extension).await?;
        debug!(stage = %IngestStage::Allocated, %id, path = %path.display(), "path allocated");

        let record = ObjectRecord::new(id, filename, path, extension, hash);
        let index = self.index.clone();
        let commit = tokio::spawn(async move {
            staged.persist(&record.stored_path).await?;
            // Removed again on drop unless the insert lands.
            let placed = PlacedObject::new(&record.stored_path);
            index.insert(&record).await?;
            placed.keep();
            drop(guard);
            Ok::<_, IngestError>(record)
        });
        let record = commit.await??;

        info!(
            stage = %IngestStage::Committed,
            id = %record.id,
            hash = %record.content_hash,
            original_name = %record.original_name,
            "object stored"
        );
        Ok(Ingested::Created(record))
    }
}

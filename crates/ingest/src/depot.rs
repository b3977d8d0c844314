//! The `Depot` service facade.

use crate::error::{IngestError, IngestResult};
use crate::pipeline::{IngestPipeline, Ingested};
use bytes::Bytes;
use depot_core::config::AppConfig;
use depot_core::{ExtensionPolicy, ObjectId, ObjectRecord};
use depot_metadata::MetadataIndex;
use depot_storage::{
    ByteStream, HashStore, PathAllocator, StagingArea, StorageError, bytes_stream, reader_stream,
    remove_object,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::fs;
use tracing::{info, instrument, warn};

/// Ordering for [`Depot::list_sorted`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ListOrder {
    #[default]
    NewestFirst,
    OldestFirst,
    /// By original name, then id.
    Name,
}

impl FromStr for ListOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "newest" => Ok(ListOrder::NewestFirst),
            "oldest" => Ok(ListOrder::OldestFirst),
            "name" => Ok(ListOrder::Name),
            other => Err(format!("unknown sort order '{other}'")),
        }
    }
}

/// A content-addressed file store: ingest, listing, retrieval, deletion.
///
/// `Depot` is `Send + Sync`; share one instance behind an `Arc`.
pub struct Depot {
    pipeline: IngestPipeline,
    io_chunk_size: usize,
}

impl Depot {
    /// Open a store from configuration, loading the configured index.
    pub async fn open(config: AppConfig) -> IngestResult<Self> {
        config.validate()?;
        let index = depot_metadata::from_config(&config.index).await?;
        Self::with_index(config, index).await
    }

    /// Open a store around an already constructed index.
    ///
    /// Stale staging files from an earlier crash are purged here.
    pub async fn with_index(config: AppConfig, index: Arc<dyn MetadataIndex>) -> IngestResult<Self> {
        config.validate()?;

        let allocator =
            PathAllocator::new(&config.storage.root, config.ingest.allocation_attempts).await?;
        let staging = StagingArea::new(config.storage.staging_path()).await?;
        let purged = staging.purge().await?;
        if purged > 0 {
            warn!(purged, "removed stale staging files");
        }

        let pipeline = IngestPipeline::new(
            ExtensionPolicy::from_config(&config.policy),
            staging,
            HashStore::new(config.ingest.io_chunk_size),
            allocator,
            index,
        )
        .with_max_object_bytes(config.ingest.max_object_bytes);

        info!(
            root = %config.storage.root.display(),
            backend = pipeline.index().backend_name(),
            "depot opened"
        );
        Ok(Self {
            pipeline,
            io_chunk_size: config.ingest.io_chunk_size,
        })
    }

    pub fn pipeline(&self) -> &IngestPipeline {
        &self.pipeline
    }

    pub fn root(&self) -> &Path {
        self.pipeline.allocator().root()
    }

    /// Store an upload. Identical content already stored is an error
    /// carrying the existing record.
    pub async fn ingest(&self, filename: &str, content: ByteStream) -> IngestResult<ObjectRecord> {
        match self.pipeline.run(filename, content).await? {
            Ingested::Created(record) => Ok(record),
            Ingested::Existing(existing) => Err(IngestError::DuplicateContent {
                existing: Box::new(existing),
            }),
        }
    }

    /// Store an upload, treating identical stored content as success.
    pub async fn ingest_or_existing(
        &self,
        filename: &str,
        content: ByteStream,
    ) -> IngestResult<Ingested> {
        self.pipeline.run(filename, content).await
    }

    pub async fn ingest_bytes(
        &self,
        filename: &str,
        data: impl Into<Bytes>,
    ) -> IngestResult<ObjectRecord> {
        self.ingest(filename, bytes_stream(data.into())).await
    }

    /// Store a local file under `filename` (its own name when `None`).
    pub async fn ingest_file(
        &self,
        path: &Path,
        filename: Option<&str>,
        existing_ok: bool,
    ) -> IngestResult<Ingested> {
        let name = match filename {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    IngestError::Storage(StorageError::InvalidPath(format!(
                        "{} has no file name",
                        path.display()
                    )))
                })?,
        };

        let file = fs::File::open(path).await.map_err(StorageError::from)?;
        let content = reader_stream(file, self.io_chunk_size);
        let outcome = self.pipeline.run(&name, content).await?;
        match outcome {
            Ingested::Existing(existing) if !existing_ok => Err(IngestError::DuplicateContent {
                existing: Box::new(existing),
            }),
            outcome => Ok(outcome),
        }
    }

    /// Every committed record, in no particular order.
    pub async fn list_all(&self) -> IngestResult<Vec<ObjectRecord>> {
        Ok(self.pipeline.index().all().await?)
    }

    pub async fn list_sorted(&self, order: ListOrder) -> IngestResult<Vec<ObjectRecord>> {
        let mut records = self.list_all().await?;
        match order {
            ListOrder::NewestFirst => records.sort_by(|a, b| {
                b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id))
            }),
            ListOrder::OldestFirst => records.sort_by(|a, b| {
                a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
            }),
            ListOrder::Name => records.sort_by(|a, b| {
                a.original_name
                    .cmp(&b.original_name)
                    .then_with(|| a.id.cmp(&b.id))
            }),
        }
        Ok(records)
    }

    /// Stored path and record for `id`.
    ///
    /// Malformed ids are reported as not found.
    pub async fn fetch(&self, id: &str) -> IngestResult<(PathBuf, ObjectRecord)> {
        let record = self.lookup(id).await?;
        Ok((record.stored_path.clone(), record))
    }

    /// Remove an object: index entry first, then the file.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> IngestResult<ObjectRecord> {
        let record = self.lookup(id).await?;
        let _guard = self.pipeline.locks().lock(record.content_hash).await;

        let record = self
            .pipeline
            .index()
            .remove(&record.id)
            .await?
            .ok_or_else(|| IngestError::NotFound(id.to_string()))?;

        match remove_object(self.root(), &record.stored_path).await {
            Ok(true) => {}
            Ok(false) => warn!(path = %record.stored_path.display(), "object file was already missing"),
            Err(e) => warn!(
                path = %record.stored_path.display(),
                error = %e,
                "failed to remove object file"
            ),
        }

        info!(id = %record.id, "object deleted");
        Ok(record)
    }

    /// Re-hash the stored file and compare with the recorded hash.
    #[instrument(skip(self))]
    pub async fn verify(&self, id: &str) -> IngestResult<ObjectRecord> {
        let record = self.lookup(id).await?;
        let actual = self
            .pipeline
            .hasher()
            .digest_file(&record.stored_path)
            .await?;
        if actual != record.content_hash {
            return Err(StorageError::HashMismatch {
                expected: record.content_hash.to_hex(),
                actual: actual.to_hex(),
            }
            .into());
        }
        Ok(record)
    }

    async fn lookup(&self, id: &str) -> IngestResult<ObjectRecord> {
        let not_found = || IngestError::NotFound(id.to_string());
        let object_id = ObjectId::new(id).map_err(|_| not_found())?;
        self.pipeline
            .index()
            .get(&object_id)
            .await?
            .ok_or_else(not_found)
    }
}

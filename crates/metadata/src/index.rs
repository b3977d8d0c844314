//! The metadata index trait.

use crate::error::MetadataResult;
use async_trait::async_trait;
use depot_core::{ContentHash, ObjectId, ObjectRecord};

/// Durable mapping from object id to record, with a content-hash lookup.
///
/// Implementations serialize mutations and persist every successful
/// `insert`/`remove` before returning. No two records share a content hash.
#[async_trait]
pub trait MetadataIndex: Send + Sync {
    /// The committed record with this content hash, if any.
    async fn lookup_by_hash(&self, hash: &ContentHash) -> MetadataResult<Option<ObjectRecord>>;

    /// Get a record by id.
    async fn get(&self, id: &ObjectId) -> MetadataResult<Option<ObjectRecord>>;

    /// Add a new record.
    ///
    /// Fails with `DuplicateHash` if the content hash is taken (checked first),
    /// or `DuplicateId` if the id is.
    async fn insert(&self, record: &ObjectRecord) -> MetadataResult<()>;

    /// Remove a record, returning it if it existed.
    async fn remove(&self, id: &ObjectId) -> MetadataResult<Option<ObjectRecord>>;

    /// Snapshot of every record, in no particular order.
    async fn all(&self) -> MetadataResult<Vec<ObjectRecord>>;

    /// Number of committed records.
    async fn count(&self) -> MetadataResult<usize>;

    /// Check that the backing store is reachable.
    async fn health_check(&self) -> MetadataResult<()>;

    fn backend_name(&self) -> &'static str;
}

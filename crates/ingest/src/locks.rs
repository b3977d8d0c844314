//! Per-content-hash critical sections.

use dashmap::DashMap;
use depot_core::ContentHash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<ContentHash, Arc<Mutex<()>>>;

/// Async mutexes keyed by content hash.
///
/// Entries exist only while some task holds or awaits the lock for that hash.
#[derive(Clone, Debug, Default)]
pub struct HashLocks {
    inner: Arc<LockMap>,
}

impl HashLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `hash`.
    ///
    /// Dropping the future while it waits leaves no entry behind.
    pub async fn lock(&self, hash: ContentHash) -> HashLockGuard {
        // Clone the mutex out so the shard lock is released before awaiting.
        let entry = LockEntry {
            hash,
            map: Arc::clone(&self.inner),
            mutex: self.inner.entry(hash).or_default().value().clone(),
        };
        let guard = Arc::clone(&entry.mutex).lock_owned().await;
        HashLockGuard {
            _guard: guard,
            entry,
        }
    }

    /// Number of hashes currently locked or contended.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// One task's interest in a map entry, held from before it waits until
/// after it releases.
struct LockEntry {
    hash: ContentHash,
    map: Arc<LockMap>,
    mutex: Arc<Mutex<()>>,
}

impl Drop for LockEntry {
    fn drop(&mut self) {
        // Only the map and this entry still reference the mutex.
        self.map
            .remove_if(&self.hash, |_, mutex| Arc::strong_count(mutex) == 2);
    }
}

/// Holds the critical section for one hash until dropped.
pub struct HashLockGuard {
    // Released before the entry is given up.
    _guard: OwnedMutexGuard<()>,
    entry: LockEntry,
}

impl HashLockGuard {
    pub fn hash(&self) -> &ContentHash {
        &self.entry.hash
    }
}

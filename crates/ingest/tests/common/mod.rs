#![allow(dead_code)]

use async_trait::async_trait;
use depot_core::config::AppConfig;
use depot_core::{ContentHash, ObjectId, ObjectRecord};
use depot_ingest::Depot;
use depot_metadata::{MetadataError, MetadataIndex, MetadataResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Config rooted in a temp dir with the default policy.
pub fn test_config(dir: &Path) -> AppConfig {
    AppConfig::for_testing(dir)
}

pub async fn open_depot(dir: &Path) -> Depot {
    Depot::open(test_config(dir)).await.unwrap()
}

/// Every regular file under `root`, excluding the staging area.
pub fn stored_files(root: &Path) -> Vec<PathBuf> {
    fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if entry.file_name() != ".staging" {
                    walk(&path, out);
                }
            } else {
                out.push(path);
            }
        }
    }
    let mut out = Vec::new();
    walk(root, &mut out);
    out.sort();
    out
}

/// Files currently in the staging area.
pub fn staging_files(root: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(root.join(".staging")) {
        Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

/// Wraps an index and fails inserts while `fail_inserts` is set.
pub struct FlakyIndex {
    pub inner: Arc<dyn MetadataIndex>,
    pub fail_inserts: AtomicBool,
}

impl FlakyIndex {
    pub fn new(inner: Arc<dyn MetadataIndex>) -> Self {
        Self {
            inner,
            fail_inserts: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl MetadataIndex for FlakyIndex {
    async fn lookup_by_hash(&self, hash: &ContentHash) -> MetadataResult<Option<ObjectRecord>> {
        self.inner.lookup_by_hash(hash).await
    }

    async fn get(&self, id: &ObjectId) -> MetadataResult<Option<ObjectRecord>> {
        self.inner.get(id).await
    }

    async fn insert(&self, record: &ObjectRecord) -> MetadataResult<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(MetadataError::Io(std::io::Error::other("disk full")));
        }
        self.inner.insert(record).await
    }

    async fn remove(&self, id: &ObjectId) -> MetadataResult<Option<ObjectRecord>> {
        self.inner.remove(id).await
    }

    async fn all(&self) -> MetadataResult<Vec<ObjectRecord>> {
        self.inner.all().await
    }

    async fn count(&self) -> MetadataResult<usize> {
        self.inner.count().await
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.inner.health_check().await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

/// Wraps an index and stalls every insert before passing it on (or failing it).
pub struct SlowIndex {
    pub inner: Arc<dyn MetadataIndex>,
    pub delay: Duration,
    pub fail: bool,
}

#[async_trait]
impl MetadataIndex for SlowIndex {
    async fn lookup_by_hash(&self, hash: &ContentHash) -> MetadataResult<Option<ObjectRecord>> {
        self.inner.lookup_by_hash(hash).await
    }

    async fn get(&self, id: &ObjectId) -> MetadataResult<Option<ObjectRecord>> {
        self.inner.get(id).await
    }

    async fn insert(&self, record: &ObjectRecord) -> MetadataResult<()> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(MetadataError::Io(std::io::Error::other("index unavailable")));
        }
        self.inner.insert(record).await
    }

    async fn remove(&self, id: &ObjectId) -> MetadataResult<Option<ObjectRecord>> {
        self.inner.remove(id).await
    }

    async fn all(&self) -> MetadataResult<Vec<ObjectRecord>> {
        self.inner.all().await
    }

    async fn count(&self) -> MetadataResult<usize> {
        self.inner.count().await
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.inner.health_check().await
    }

    fn backend_name(&self) -> &'static str {
        "slow"
    }
}

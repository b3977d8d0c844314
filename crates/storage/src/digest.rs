//! Content digests over byte streams.

use crate::error::StorageResult;
use crate::traits::ByteStream;
use depot_core::ContentHash;
use futures::StreamExt;
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::instrument;

/// Default read size for hashing (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Stateless SHA-256 digester that reads its input in bounded chunks.
///
/// The digest depends only on the bytes, never on how they were split.
#[derive(Clone, Copy, Debug)]
pub struct HashStore {
    chunk_size: usize,
}

impl HashStore {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Digest everything readable from `reader`.
    pub async fn digest<R>(&self, mut reader: R) -> StorageResult<ContentHash>
    where
        R: AsyncRead + Unpin,
    {
        let mut hasher = ContentHash::hasher();
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize())
    }

    /// Digest a file on disk.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn digest_file(&self, path: &Path) -> StorageResult<ContentHash> {
        let file = fs::File::open(path).await?;
        self.digest(file).await
    }

    /// Digest a stream of byte chunks as they arrive.
    pub async fn digest_stream(&self, mut stream: ByteStream) -> StorageResult<ContentHash> {
        let mut hasher = ContentHash::hasher();
        while let Some(chunk) = stream.next().await {
            hasher.update(&chunk?);
        }
        Ok(hasher.finalize())
    }
}

impl Default for HashStore {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

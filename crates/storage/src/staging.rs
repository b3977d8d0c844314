//! Temporary staging of incoming uploads.
//!
//! Uploads are written to `<root>/<staging_dir>/<random>.part` before they
//! are hashed and moved into the sharded tree. A [`StagedFile`] owns its
//! temporary file and deletes it on drop unless it was persisted, so errors
//! and cancelled uploads never leave data behind.

use crate::error::{StorageError, StorageResult};
use crate::traits::ByteStream;
use futures::StreamExt;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

const STAGING_SUFFIX: &str = "part";

/// Directory holding in-flight uploads.
#[derive(Clone, Debug)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    /// Open a staging area, creating the directory if needed.
    pub async fn new(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `content` to a new staging file and flush it to disk.
    ///
    /// Fails with [`StorageError::TooLarge`] as soon as more than `max_bytes`
    /// have arrived.
    #[instrument(skip(self, content), fields(staging = %self.dir.display()))]
    pub async fn stage(
        &self,
        mut content: ByteStream,
        max_bytes: Option<u64>,
    ) -> StorageResult<StagedFile> {
        let path = self
            .dir
            .join(format!("{}.{STAGING_SUFFIX}", Uuid::new_v4().simple()));
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        let mut staged = StagedFile {
            path,
            size: 0,
            released: false,
        };

        while let Some(chunk) = content.next().await {
            let chunk = chunk?;
            staged.size += chunk.len() as u64;
            if let Some(limit) = max_bytes
                && staged.size > limit
            {
                return Err(StorageError::TooLarge { limit });
            }
            file.write_all(&chunk).await?;
        }
        // Ensure data is on disk before anything reads it back
        file.sync_all().await?;
        drop(file);

        tracing::debug!(
            path = %staged.path.display(),
            size = staged.size,
            "Upload staged"
        );
        Ok(staged)
    }

    /// Remove staging files left behind by an earlier process.
    ///
    /// Only call this before any upload is in flight.
    #[instrument(skip(self), fields(staging = %self.dir.display()))]
    pub async fn purge(&self) -> StorageResult<usize> {
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_part = path
                .extension()
                .is_some_and(|ext| ext == OsStr::new(STAGING_SUFFIX));
            if entry.file_type().await?.is_file() && is_part {
                match fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        if removed > 0 {
            tracing::warn!(removed, "Removed stale staging files");
        }
        Ok(removed)
    }
}

/// A fully written staging file.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    size: u64,
    released: bool,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes staged.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Move the staged bytes to `dest`.
    ///
    /// Uses a rename; across filesystems it falls back to copy, fsync, then
    /// removing the staging file. On failure any partial `dest` is removed and
    /// the staging file is deleted when `self` drops.
    #[instrument(skip(self), fields(src = %self.path.display(), dest = %dest.display()))]
    pub async fn persist(mut self, dest: &Path) -> StorageResult<()> {
        match fs::rename(&self.path, dest).await {
            Ok(()) => {
                self.released = true;
                return Ok(());
            }
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                tracing::debug!("Staging area on another filesystem, copying instead of rename");
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = copy_durably(&self.path, dest).await {
            if let Err(cleanup) = fs::remove_file(dest).await
                && cleanup.kind() != ErrorKind::NotFound
            {
                tracing::warn!(error = %cleanup, "Failed to remove partial copy");
            }
            return Err(e);
        }

        self.released = true;
        if let Err(e) = fs::remove_file(&self.path).await {
            tracing::warn!(error = %e, "Failed to remove staging file after copy");
        }
        Ok(())
    }

    /// Delete the staging file now.
    pub async fn discard(mut self) -> StorageResult<()> {
        self.released = true;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Staging file removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove staging file"
            ),
        }
    }
}

async fn copy_durably(src: &Path, dest: &Path) -> StorageResult<()> {
    fs::copy(src, dest).await?;
    let file = fs::OpenOptions::new().write(true).open(dest).await?;
    file.sync_all().await?;
    Ok(())
}

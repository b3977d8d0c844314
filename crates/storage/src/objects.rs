//! Operations on committed object files.

use crate::error::{StorageError, StorageResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::instrument;

/// Delete a stored object file. Returns `false` if it was already gone.
///
/// Shard directories are left in place even when empty: a concurrent
/// allocation may have just picked a path inside them.
#[instrument(skip(root, path), fields(path = %path.display()))]
pub async fn remove_object(root: &Path, path: &Path) -> StorageResult<bool> {
    if !path.starts_with(root) {
        return Err(StorageError::InvalidPath(format!(
            "{} is outside storage root {}",
            path.display(),
            root.display()
        )));
    }

    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// An object file that has been written but not yet recorded anywhere.
///
/// Dropping it deletes the file. Call [`PlacedObject::keep`] once the
/// object is referenced by the index.
#[derive(Debug)]
pub struct PlacedObject {
    path: PathBuf,
    kept: bool,
}

impl PlacedObject {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kept: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disarm the guard and hand back the path.
    pub fn keep(mut self) -> PathBuf {
        self.kept = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for PlacedObject {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Unrecorded object removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove unrecorded object"
            ),
        }
    }
}

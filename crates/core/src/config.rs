//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Largest accepted read size for hashing and staging.
pub const MAX_IO_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// File storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the sharded object tree.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// Name of the staging directory created under `root`.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_staging_dir() -> String {
    ".staging".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            staging_dir: default_staging_dir(),
        }
    }
}

impl StorageConfig {
    /// Absolute-or-relative path of the staging directory.
    pub fn staging_path(&self) -> PathBuf {
        self.root.join(&self.staging_dir)
    }

    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        let mut components = Path::new(&self.staging_dir).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => {
                return Err(format!(
                    "storage.staging_dir must be a single directory name, got '{}'",
                    self.staging_dir
                ));
            }
        }
        // Two hex characters would collide with a shard directory.
        if self.staging_dir.len() == 2 && self.staging_dir.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!(
                "storage.staging_dir '{}' collides with the shard layout",
                self.staging_dir
            ));
        }
        Ok(())
    }
}

/// Metadata index configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IndexConfig {
    /// A single JSON document keyed by object id.
    Json {
        /// Metadata file path.
        path: PathBuf,
    },
    /// Embedded SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// How long a connection waits on a locked database.
        #[serde(default = "default_busy_timeout_secs")]
        busy_timeout_secs: u64,
    },
}

fn default_busy_timeout_secs() -> u64 {
    5
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::Json {
            path: PathBuf::from("file_metadata.json"),
        }
    }
}

impl IndexConfig {
    /// Backing file of the index.
    pub fn path(&self) -> &Path {
        match self {
            IndexConfig::Json { path } | IndexConfig::Sqlite { path, .. } => path,
        }
    }
}

/// Extension allow/deny lists.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "default_denied_extensions")]
    pub denied_extensions: Vec<String>,
}

fn default_allowed_extensions() -> Vec<String> {
    [
        "png", "jpg", "jpeg", "gif", "pdf", "txt", "doc", "docx", "xls", "xlsx",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_denied_extensions() -> Vec<String> {
    ["exe", "sh", "php", "js", "py", "bat", "cmd"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            denied_extensions: default_denied_extensions(),
        }
    }
}

impl PolicyConfig {
    /// Validate extension entries.
    ///
    /// Extensions end up in stored file names, so only ASCII alphanumerics
    /// (optionally with a leading dot) are accepted. An empty entry stands for
    /// files with no extension at all.
    pub fn validate(&self) -> Result<(), String> {
        for ext in self
            .allowed_extensions
            .iter()
            .chain(self.denied_extensions.iter())
        {
            let bare = ext.trim().trim_start_matches('.');
            if !bare.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(format!("invalid extension in policy: '{ext}'"));
            }
        }
        Ok(())
    }
}

/// Ingest pipeline tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Read size used while staging and hashing.
    #[serde(default = "default_io_chunk_size")]
    pub io_chunk_size: usize,
    /// Reject uploads larger than this many bytes. Unlimited when unset.
    #[serde(default)]
    pub max_object_bytes: Option<u64>,
    /// Attempts before the path allocator gives up on id collisions.
    #[serde(default = "default_allocation_attempts")]
    pub allocation_attempts: u32,
}

fn default_io_chunk_size() -> usize {
    64 * 1024
}

fn default_allocation_attempts() -> u32 {
    8
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            io_chunk_size: default_io_chunk_size(),
            max_object_bytes: None,
            allocation_attempts: default_allocation_attempts(),
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.io_chunk_size == 0 || self.io_chunk_size > MAX_IO_CHUNK_SIZE {
            return Err(format!(
                "ingest.io_chunk_size must be between 1 and {MAX_IO_CHUNK_SIZE}, got {}",
                self.io_chunk_size
            ));
        }
        if self.allocation_attempts == 0 {
            return Err("ingest.allocation_attempts cannot be 0".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl AppConfig {
    /// Create a test configuration rooted in `dir`.
    ///
    /// **For testing only.** Uses a JSON index next to the storage tree and
    /// the default extension policy.
    pub fn for_testing(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            storage: StorageConfig {
                root: dir.join("uploads"),
                staging_dir: default_staging_dir(),
            },
            index: IndexConfig::Json {
                path: dir.join("file_metadata.json"),
            },
            policy: PolicyConfig::default(),
            ingest: IngestConfig::default(),
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> crate::Result<()> {
        self.storage
            .validate()
            .and_then(|()| self.policy.validate())
            .and_then(|()| self.ingest.validate())
            .map_err(crate::Error::Config)
    }
}

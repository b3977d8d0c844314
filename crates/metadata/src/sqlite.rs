//! SQLite-backed metadata index.

use crate::error::{MetadataError, MetadataResult};
use crate::index::MetadataIndex;
use crate::models::ObjectRow;
use async_trait::async_trait;
use depot_core::{ContentHash, ObjectId, ObjectRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument};

const SELECT_COLUMNS: &str =
    "SELECT uuid, original_name, upload_date, server_path, extension, hash FROM objects";

/// Metadata index in a single-table SQLite database.
pub struct SqliteIndex {
    pool: Pool<Sqlite>,
    path: PathBuf,
}

impl SqliteIndex {
    /// Open (or create) the database at `path`.
    pub async fn open(path: impl AsRef<Path>, busy_timeout_secs: u64) -> MetadataResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let existing = std::fs::metadata(&path).is_ok_and(|m| m.len() > 0);

        let opts = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(Duration::from_secs(busy_timeout_secs));

        let opened = async {
            let pool = SqlitePoolOptions::new()
                // One connection serializes writers; the check-then-insert below relies on it.
                .max_connections(1)
                .connect_with(opts)
                .await?;
            let index = Self {
                pool,
                path: path.clone(),
            };
            index.migrate().await?;
            Ok::<_, MetadataError>(index)
        };

        let result = opened.await;
        let index = match result {
            Ok(index) => index,
            // A file that was already there and is not a usable database.
            Err(MetadataError::Database(sqlx::Error::Database(e))) if existing => {
                return Err(MetadataError::Corrupt {
                    path,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        info!(path = %index.path.display(), "opened SQLite metadata index");
        Ok(index)
    }

    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS objects (
                uuid TEXT PRIMARY KEY NOT NULL,
                original_name TEXT NOT NULL,
                upload_date TEXT NOT NULL,
                server_path TEXT NOT NULL UNIQUE,
                extension TEXT NOT NULL,
                hash TEXT NOT NULL UNIQUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn decode(&self, row: ObjectRow) -> MetadataResult<ObjectRecord> {
        row.into_record(&self.path)
    }

    fn parse_id(&self, raw: String) -> MetadataResult<ObjectId> {
        ObjectId::new(raw.as_str()).map_err(|e| MetadataError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl MetadataIndex for SqliteIndex {
    async fn lookup_by_hash(&self, hash: &ContentHash) -> MetadataResult<Option<ObjectRecord>> {
        let row = sqlx::query_as::<_, ObjectRow>(&format!("{SELECT_COLUMNS} WHERE hash = ?"))
            .bind(hash.to_hex())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| self.decode(r)).transpose()
    }

    async fn get(&self, id: &ObjectId) -> MetadataResult<Option<ObjectRecord>> {
        let row = sqlx::query_as::<_, ObjectRow>(&format!("{SELECT_COLUMNS} WHERE uuid = ?"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| self.decode(r)).transpose()
    }

    #[instrument(skip(self, record), fields(backend = "sqlite", object_id = %record.id))]
    async fn insert(&self, record: &ObjectRecord) -> MetadataResult<()> {
        let row = ObjectRow::from_record(record)?;
        let mut tx = self.pool.begin().await?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT uuid FROM objects WHERE hash = ?")
                .bind(&row.hash)
                .fetch_optional(&mut *tx)
                .await?;
        if let Some(existing) = existing {
            return Err(MetadataError::DuplicateHash {
                hash: record.content_hash,
                existing: self.parse_id(existing)?,
            });
        }

        let id_taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM objects WHERE uuid = ?)")
                .bind(&row.uuid)
                .fetch_one(&mut *tx)
                .await?;
        if id_taken {
            return Err(MetadataError::DuplicateId(record.id.clone()));
        }

        sqlx::query(
            r#"
            INSERT INTO objects (uuid, original_name, upload_date, server_path, extension, hash)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.uuid)
        .bind(&row.original_name)
        .bind(&row.upload_date)
        .bind(&row.server_path)
        .bind(&row.extension)
        .bind(&row.hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(id = %record.id, hash = %record.content_hash, "record inserted");
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    async fn remove(&self, id: &ObjectId) -> MetadataResult<Option<ObjectRecord>> {
        let row = sqlx::query_as::<_, ObjectRow>(
            "DELETE FROM objects WHERE uuid = ? \
             RETURNING uuid, original_name, upload_date, server_path, extension, hash",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if row.is_some() {
            debug!(%id, "record removed");
        }
        row.map(|r| self.decode(r)).transpose()
    }

    async fn all(&self) -> MetadataResult<Vec<ObjectRecord>> {
        let rows = sqlx::query_as::<_, ObjectRow>(SELECT_COLUMNS)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(|r| self.decode(r)).collect()
    }

    async fn count(&self) -> MetadataResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM objects")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

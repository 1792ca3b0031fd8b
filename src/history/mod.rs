//! Persistent download history for cross-run deduplication.
//!
//! One row per content [`Fingerprint`]; a `completed` row is the only thing
//! that makes the dispatcher skip a descriptor. Reads may run concurrently,
//! writes go through a single async mutex so only one writer touches the
//! database at a time.
//!
//! # Example
//!
//! ```ignore
//! use bulkdl_core::history::{CompletionMetadata, SqliteHistory};
//! use bulkdl_core::Database;
//!
//! let history = SqliteHistory::new(Database::new(path).await?);
//! if !history.has_completed(&fingerprint).await? {
//!     // ... download ...
//!     history.record_completed(&fingerprint, &metadata).await?;
//! }
//! ```

mod error;
mod store;

pub use error::{HistoryError, StoreErrorKind};
pub use store::{CompletionMetadata, HistoryStore};

use std::sync::Arc;

use sqlx::FromRow;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::content::Fingerprint;
use crate::db::Database;

/// Status label stored for completed downloads.
const STATUS_COMPLETED: &str = "completed";

/// Result type for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;

/// A persisted history row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct HistoryRecord {
    /// Deduplication key.
    pub fingerprint: String,
    /// Completion status label.
    pub status: String,
    /// Origin URL.
    pub source_url: String,
    /// Saved path, when known.
    pub file_path: Option<String>,
    /// Saved size in bytes, when known.
    pub file_size: Option<i64>,
    /// `SQLite` datetime of the first completion.
    pub completed_at: String,
}

/// SQLite-backed history store.
#[derive(Debug, Clone)]
pub struct SqliteHistory {
    db: Database,
    write_lock: Arc<Mutex<()>>,
}

impl SqliteHistory {
    /// Creates a history store over an opened database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            db,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Returns true if `fingerprint` has a completed record.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::StoreUnavailable`] if the query fails.
    #[instrument(skip(self), fields(fingerprint = %fingerprint))]
    pub async fn has_completed(&self, fingerprint: &Fingerprint) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            r"SELECT 1 FROM download_history
              WHERE fingerprint = ? AND status = ?
              LIMIT 1",
        )
        .bind(fingerprint.as_str())
        .bind(STATUS_COMPLETED)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| HistoryError::unavailable("has_completed", &e))?;

        Ok(row.is_some())
    }

    /// Records `fingerprint` as completed.
    ///
    /// Idempotent: an existing record keeps its original timestamp and no
    /// second row is created. The insert is committed before returning.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::StoreUnavailable`] if the insert fails.
    #[instrument(skip(self, metadata), fields(fingerprint = %fingerprint, url = %metadata.source_url))]
    pub async fn record_completed(
        &self,
        fingerprint: &Fingerprint,
        metadata: &CompletionMetadata<'_>,
    ) -> Result<()> {
        let file_path = metadata
            .file_path
            .map(|path| path.to_string_lossy().into_owned());
        let file_size = metadata
            .file_size
            .map(|size| i64::try_from(size).unwrap_or(i64::MAX));

        let _writer = self.write_lock.lock().await;
        let result = sqlx::query(
            r"INSERT INTO download_history (fingerprint, status, source_url, file_path, file_size)
              VALUES (?, ?, ?, ?, ?)
              ON CONFLICT(fingerprint) DO NOTHING",
        )
        .bind(fingerprint.as_str())
        .bind(STATUS_COMPLETED)
        .bind(metadata.source_url)
        .bind(file_path)
        .bind(file_size)
        .execute(self.db.pool())
        .await
        .map_err(|e| HistoryError::unavailable("record_completed", &e))?;

        debug!(inserted = result.rows_affected(), "history record written");
        Ok(())
    }

    /// Fetches the record for `fingerprint`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::StoreUnavailable`] if the query fails.
    #[instrument(skip(self), fields(fingerprint = %fingerprint))]
    pub async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<HistoryRecord>> {
        sqlx::query_as::<_, HistoryRecord>(r"SELECT * FROM download_history WHERE fingerprint = ?")
            .bind(fingerprint.as_str())
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| HistoryError::unavailable("get", &e))
    }

    /// Counts completed records.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::StoreUnavailable`] if the query fails.
    #[instrument(skip(self))]
    pub async fn count_completed(&self) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as(r"SELECT COUNT(*) FROM download_history WHERE status = ?")
                .bind(STATUS_COMPLETED)
                .fetch_one(self.db.pool())
                .await
                .map_err(|e| HistoryError::unavailable("count_completed", &e))?;
        Ok(count)
    }

    /// Removes the record for `fingerprint` so the next run fetches it again.
    ///
    /// Returns true if a record was removed.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::StoreUnavailable`] if the delete fails.
    #[instrument(skip(self), fields(fingerprint = %fingerprint))]
    pub async fn forget(&self, fingerprint: &Fingerprint) -> Result<bool> {
        let _writer = self.write_lock.lock().await;
        let result = sqlx::query(r"DELETE FROM download_history WHERE fingerprint = ?")
            .bind(fingerprint.as_str())
            .execute(self.db.pool())
            .await
            .map_err(|e| HistoryError::unavailable("forget", &e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns the underlying database handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }
}

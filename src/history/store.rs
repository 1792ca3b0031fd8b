//! Store seam used by the dispatcher for history lookups and writes.
//!
//! The dispatcher depends on this trait rather than on [`SqliteHistory`]
//! directly so tests can inject failing or counting stores.

use std::path::Path;

use async_trait::async_trait;

use super::{Result, SqliteHistory};
use crate::content::Fingerprint;

/// Metadata stored alongside a completion record.
#[derive(Debug, Clone, Copy)]
pub struct CompletionMetadata<'a> {
    /// Origin URL of the completed file.
    pub source_url: &'a str,
    /// Where the file was written.
    pub file_path: Option<&'a Path>,
    /// Final byte size.
    pub file_size: Option<u64>,
}

/// Data-access contract for cross-run deduplication.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Returns true if a completed record exists for `fingerprint`.
    async fn has_completed(&self, fingerprint: &Fingerprint) -> Result<bool>;

    /// Durably records `fingerprint` as completed. Recording twice is a no-op.
    async fn record_completed(
        &self,
        fingerprint: &Fingerprint,
        metadata: &CompletionMetadata<'_>,
    ) -> Result<()>;
}

#[async_trait]
impl HistoryStore for SqliteHistory {
    async fn has_completed(&self, fingerprint: &Fingerprint) -> Result<bool> {
        SqliteHistory::has_completed(self, fingerprint).await
    }

    async fn record_completed(
        &self,
        fingerprint: &Fingerprint,
        metadata: &CompletionMetadata<'_>,
    ) -> Result<()> {
        SqliteHistory::record_completed(self, fingerprint, metadata).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::content::FingerprintPolicy;

    async fn is_known(store: &impl HistoryStore, fingerprint: &Fingerprint) -> bool {
        store.has_completed(fingerprint).await.unwrap()
    }

    #[tokio::test]
    async fn test_history_store_trait_delegates_to_sqlite() {
        let history = SqliteHistory::new(Database::new_in_memory().await.unwrap());
        let fingerprint = Fingerprint::compute(
            "https://example.com/seam.jpg",
            None,
            FingerprintPolicy::UrlOnly,
        );

        assert!(!is_known(&history, &fingerprint).await);

        HistoryStore::record_completed(
            &history,
            &fingerprint,
            &CompletionMetadata {
                source_url: "https://example.com/seam.jpg",
                file_path: None,
                file_size: Some(3),
            },
        )
        .await
        .unwrap();

        assert!(is_known(&history, &fingerprint).await);
    }
}

//! Change detection - decide whether a document needs (re)extraction.

use std::sync::Arc;

use crate::error::Result;
use crate::hash::content_hash;
use crate::traits::store::RecordStore;
use crate::types::task::TaskKind;

/// Decides whether a document needs (re)extraction by comparing the
/// stored record's hash against the current content hash.
///
/// Pure decision logic aside from the single record read it performs.
pub struct ChangeDetector<R> {
    records: Arc<R>,
}

impl<R: RecordStore> ChangeDetector<R> {
    /// Create a detector over a record store.
    pub fn new(records: Arc<R>) -> Self {
        Self { records }
    }

    /// Whether the document at `path` with the given content needs
    /// (re)extraction.
    ///
    /// True iff no record exists or the stored hash differs from the
    /// current one. A tombstoned record counts as absent, so a
    /// re-created document is re-extracted.
    pub async fn needs_processing(&self, path: &str, content: &str) -> Result<bool> {
        Ok(self.classify(path, content).await?.is_some())
    }

    /// Like [`needs_processing`](Self::needs_processing), but reports why:
    /// `Extract` when no usable record exists, `Reextract` when the
    /// content changed, `None` when the stored record is current.
    pub async fn classify(&self, path: &str, content: &str) -> Result<Option<TaskKind>> {
        let current = content_hash(content);

        let kind = match self.records.read_record(path).await? {
            None => Some(TaskKind::Extract),
            Some(record) if record.deleted => Some(TaskKind::Extract),
            Some(record) if record.content_hash != current => Some(TaskKind::Reextract),
            Some(_) => None,
        };

        if kind.is_none() {
            tracing::debug!(path = %path, "content unchanged, skipping");
        }

        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryVault;
    use crate::types::record::ExtractionRecord;
    use serde_json::json;

    #[tokio::test]
    async fn test_absent_record_needs_processing() {
        let vault = Arc::new(MemoryVault::new());
        let detector = ChangeDetector::new(vault);

        assert!(detector.needs_processing("notes/a.md", "content").await.unwrap());
        assert_eq!(
            detector.classify("notes/a.md", "content").await.unwrap(),
            Some(TaskKind::Extract)
        );
    }

    #[tokio::test]
    async fn test_matching_hash_skips() {
        let vault = Arc::new(MemoryVault::new());
        let content = "# Note\n\nBody";
        let record = ExtractionRecord::new("notes/a.md", content_hash(content), json!({}));
        vault.write_record(&record).await.unwrap();

        let detector = ChangeDetector::new(vault);
        assert!(!detector.needs_processing("notes/a.md", content).await.unwrap());
    }

    #[tokio::test]
    async fn test_changed_hash_reprocesses() {
        let vault = Arc::new(MemoryVault::new());
        let record = ExtractionRecord::new("notes/a.md", content_hash("old content"), json!({}));
        vault.write_record(&record).await.unwrap();

        let detector = ChangeDetector::new(vault);
        assert_eq!(
            detector.classify("notes/a.md", "new content").await.unwrap(),
            Some(TaskKind::Reextract)
        );
    }

    #[tokio::test]
    async fn test_tombstoned_record_counts_as_absent() {
        let vault = Arc::new(MemoryVault::new());
        let content = "resurrected note";
        let record =
            ExtractionRecord::new("notes/a.md", content_hash(content), json!({})).tombstone();
        vault.write_record(&record).await.unwrap();

        let detector = ChangeDetector::new(vault);
        assert_eq!(
            detector.classify("notes/a.md", content).await.unwrap(),
            Some(TaskKind::Extract)
        );
    }
}

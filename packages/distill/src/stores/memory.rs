//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::error::Result;
use crate::traits::store::{DocumentStore, ErrorSink, RecordStore};
use crate::types::record::{ExtractionFailure, ExtractionRecord};

/// In-memory vault: documents, records, and the error log in one place.
///
/// Useful for testing and development. Not suitable for production as
/// data is lost on restart. Write counters let tests assert side-effect
/// bounds (e.g. that a dry run never persists a record).
#[derive(Default)]
pub struct MemoryVault {
    documents: RwLock<HashMap<String, String>>,
    records: RwLock<HashMap<String, ExtractionRecord>>,
    failures: RwLock<Vec<ExtractionFailure>>,
    record_writes: AtomicUsize,
}

impl MemoryVault {
    /// Create an empty vault.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn document_count(&self) -> usize {
        self.documents.read().unwrap().len()
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Number of `write_record` calls observed.
    pub fn record_write_count(&self) -> usize {
        self.record_writes.load(Ordering::SeqCst)
    }

    /// Number of error-log entries.
    pub fn failure_count(&self) -> usize {
        self.failures.read().unwrap().len()
    }

    /// Snapshot of the error log.
    pub fn failures(&self) -> Vec<ExtractionFailure> {
        self.failures.read().unwrap().clone()
    }

    /// Reset write counters (not the stored data).
    pub fn reset_counters(&self) {
        self.record_writes.store(0, Ordering::SeqCst);
    }

    /// Clear all stored data and counters.
    pub fn clear(&self) {
        self.documents.write().unwrap().clear();
        self.records.write().unwrap().clear();
        self.failures.write().unwrap().clear();
        self.reset_counters();
    }
}

#[async_trait]
impl DocumentStore for MemoryVault {
    async fn read(&self, path: &str) -> Result<Option<String>> {
        Ok(self.documents.read().unwrap().get(path).cloned())
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        self.documents
            .write()
            .unwrap()
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>> {
        let mut paths: Vec<_> = self
            .documents
            .read()
            .unwrap()
            .keys()
            .filter(|path| dir.is_empty() || path.starts_with(dir))
            .cloned()
            .collect();
        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl RecordStore for MemoryVault {
    async fn read_record(&self, path: &str) -> Result<Option<ExtractionRecord>> {
        Ok(self.records.read().unwrap().get(path).cloned())
    }

    async fn write_record(&self, record: &ExtractionRecord) -> Result<()> {
        record.validate()?;
        self.record_writes.fetch_add(1, Ordering::SeqCst);
        self.records
            .write()
            .unwrap()
            .insert(record.path.clone(), record.clone());
        Ok(())
    }
}

#[async_trait]
impl ErrorSink for MemoryVault {
    async fn append(&self, failure: &ExtractionFailure) -> Result<()> {
        self.failures.write().unwrap().push(failure.clone());
        Ok(())
    }
}

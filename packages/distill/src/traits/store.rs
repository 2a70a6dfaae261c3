//! Storage traits for documents, records, and the error log.
//!
//! The storage layer is split into focused traits:
//! - `DocumentStore`: raw note content (the vault)
//! - `RecordStore`: schema-validated extraction records
//! - `ErrorSink`: append-only, durable failure log
//!
//! "Not found" is always a distinguishable, non-fatal outcome (`Ok(None)`),
//! never an error.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::record::{ExtractionFailure, ExtractionRecord};

/// Access to the source documents (the vault).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document's content. Returns `None` if the document is absent.
    async fn read(&self, path: &str) -> Result<Option<String>>;

    /// Write a document.
    async fn write(&self, path: &str, content: &str) -> Result<()>;

    /// List document paths under a directory, recursively.
    async fn list(&self, dir: &str) -> Result<Vec<String>>;
}

/// Persistence for extraction records, keyed by document path.
///
/// Implementations must validate records before persisting
/// ([`ExtractionRecord::validate`]) and fail loudly on violation rather
/// than silently coercing.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read the record for a path. Returns `None` if no record exists.
    async fn read_record(&self, path: &str) -> Result<Option<ExtractionRecord>>;

    /// Persist a record, replacing any previous record for the same path.
    async fn write_record(&self, record: &ExtractionRecord) -> Result<()>;
}

/// Append-only log of terminal extraction failures.
///
/// Entries survive process restarts (in durable implementations) so
/// failure diagnostics outlive the run that produced them.
#[async_trait]
pub trait ErrorSink: Send + Sync {
    /// Append one failure entry.
    async fn append(&self, failure: &ExtractionFailure) -> Result<()>;
}

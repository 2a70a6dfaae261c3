//! Record types - the structured artifacts produced by extraction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{IndexError, Result};

/// Review status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Produced by extraction, not yet reviewed
    Draft,
    /// Confirmed by the host (or its user)
    Confirmed,
}

/// The structured record extracted from one source document.
///
/// Records are keyed by document path. The engine never physically erases
/// a record it produced; deletion is a tombstone flag set by an external
/// deletion event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// Source document path (unique key)
    pub path: String,

    /// Content hash of the source at extraction time
    pub content_hash: String,

    /// Extracted fields, validated against the output schema
    pub fields: Value,

    /// Review status
    pub status: RecordStatus,

    /// Tombstone flag; set when the source document was deleted
    #[serde(default)]
    pub deleted: bool,

    /// When the record was extracted
    pub extracted_at: DateTime<Utc>,

    /// Provider that produced the fields, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl ExtractionRecord {
    /// Create a new draft record.
    pub fn new(path: impl Into<String>, content_hash: impl Into<String>, fields: Value) -> Self {
        Self {
            path: path.into(),
            content_hash: content_hash.into(),
            fields,
            status: RecordStatus::Draft,
            deleted: false,
            extracted_at: Utc::now(),
            provider: None,
        }
    }

    /// Set the producing provider.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Mark the record confirmed.
    pub fn confirm(mut self) -> Self {
        self.status = RecordStatus::Confirmed;
        self
    }

    /// Tombstone the record, retaining it rather than erasing it.
    pub fn tombstone(mut self) -> Self {
        self.deleted = true;
        self
    }

    /// Structural validation performed by stores before persistence.
    ///
    /// Fails loudly instead of coercing: an empty path, an empty hash, or
    /// non-object fields are persistence bugs, not data.
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(IndexError::InvalidRecord {
                reason: "record path must not be empty".into(),
            });
        }
        if self.content_hash.is_empty() {
            return Err(IndexError::InvalidRecord {
                reason: format!("record for {} has an empty content hash", self.path),
            });
        }
        if !self.fields.is_object() {
            return Err(IndexError::InvalidRecord {
                reason: format!("record for {} has non-object fields", self.path),
            });
        }
        Ok(())
    }
}

/// One append-only error-log entry, written on terminal extraction failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionFailure {
    /// Document path that failed
    pub path: String,

    /// Last error message
    pub message: String,

    /// When the failure was recorded
    pub timestamp: DateTime<Utc>,

    /// Total provider calls made before giving up
    pub attempts: u32,
}

impl ExtractionFailure {
    /// Create a failure entry stamped now.
    pub fn new(path: impl Into<String>, message: impl Into<String>, attempts: u32) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            timestamp: Utc::now(),
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_lifecycle() {
        let record = ExtractionRecord::new("notes/a.md", "abc123", json!({"title": "A"}));
        assert_eq!(record.status, RecordStatus::Draft);
        assert!(!record.deleted);

        let record = record.confirm().tombstone();
        assert_eq!(record.status, RecordStatus::Confirmed);
        assert!(record.deleted);
    }

    #[test]
    fn test_validate_rejects_non_object_fields() {
        let record = ExtractionRecord::new("notes/a.md", "abc123", json!(["not", "an", "object"]));
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_path() {
        let record = ExtractionRecord::new("", "abc123", json!({}));
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_record_roundtrip() {
        let record = ExtractionRecord::new("notes/a.md", "abc123", json!({"title": "A"}))
            .with_provider("openai");
        let json = serde_json::to_string(&record).unwrap();
        let back: ExtractionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.path, "notes/a.md");
        assert_eq!(back.provider.as_deref(), Some("openai"));
    }
}

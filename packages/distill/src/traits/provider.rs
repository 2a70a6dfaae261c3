//! Provider trait for structured extraction.
//!
//! Implementations wrap specific LLM providers and handle the specifics
//! of prompting and response parsing. The engine only sees this trait:
//! a call either yields parsed JSON fields or a typed error whose
//! retryable/terminal split drives the attempt state machine. Each
//! provider enforces its own per-attempt timeout.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;
use crate::types::schema::OutputSchema;

/// A request built once per document and reused across retries.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Source document path (for logging and provenance)
    pub path: String,

    /// Normalized document content
    pub content: String,

    /// Rendered extraction prompt
    pub prompt: String,
}

impl ExtractionRequest {
    /// Create a new request.
    pub fn new(
        path: impl Into<String>,
        content: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            prompt: prompt.into(),
        }
    }
}

/// Parsed provider output, prior to schema validation.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Extracted fields as parsed JSON
    pub fields: Value,

    /// Model that produced the output, if reported
    pub model: Option<String>,
}

impl ProviderResponse {
    /// Create a response from parsed fields.
    pub fn new(fields: Value) -> Self {
        Self { fields, model: None }
    }

    /// Set the reporting model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Text-generation provider capable of structured extraction.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Call the provider with a built request and the output schema.
    ///
    /// Returns parsed JSON fields (validated for JSON-ness only; schema
    /// validation is the caller's concern) or a typed error. Timeouts,
    /// rate limits, and server errors are retryable; rejected requests
    /// are terminal.
    async fn call(
        &self,
        request: &ExtractionRequest,
        schema: &OutputSchema,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Short identifier for provenance (e.g. "openai", "ollama").
    fn name(&self) -> &str;
}

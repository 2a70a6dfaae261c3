//! Typed errors for the indexing engine.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. The taxonomy separates
//! per-document failures (captured into task results) from engine faults
//! (storage, configuration) that propagate to the caller.

use thiserror::Error;

/// Errors that can occur during indexing operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Source document missing; fails one task only
    #[error("document not found: {path}")]
    NotFound { path: String },

    /// Provider call failed
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Structured output failed schema checks
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Retry budget exhausted; terminal per-document failure
    #[error("retries exhausted after {attempts} attempts: {message}")]
    RetryExhausted { attempts: u32, message: String },

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A record violated its structural invariants at persistence time
    #[error("invalid record: {reason}")]
    InvalidRecord { reason: String },

    /// A task for this path is already live in the pool
    #[error("duplicate task for path: {path}")]
    DuplicateTask { path: String },

    /// The pool was cancelled; no further dispatch
    #[error("operation cancelled")]
    Cancelled,

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {reason}")]
    Config { reason: String },
}

impl IndexError {
    /// Wrap an arbitrary storage backend error.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(err))
    }
}

/// Errors from the extraction provider.
///
/// The retryable/terminal split drives the attempt state machine:
/// timeouts, rate limits, and server-side faults are worth retrying with
/// the same request; a rejected request is not.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The per-attempt timeout elapsed
    #[error("provider call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Provider signalled rate limiting (HTTP 429 or equivalent)
    #[error("provider rate limited")]
    RateLimited,

    /// Server-side failure (HTTP 5xx or equivalent)
    #[error("provider server error: status {status}")]
    Server { status: u16 },

    /// Transport-level failure
    #[error("provider transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The provider rejected the request; retrying the same request is futile
    #[error("provider rejected request: {message}")]
    BadRequest { message: String },

    /// Response arrived but could not be parsed into structured output
    #[error("malformed provider response: {message}")]
    MalformedResponse { message: String },
}

impl ProviderError {
    /// Whether this failure counts as retryable under the attempt budget.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::BadRequest { .. })
    }
}

/// Errors from validating structured output against an [`OutputSchema`].
///
/// Always retryable: the provider may produce conforming output on the
/// next attempt.
///
/// [`OutputSchema`]: crate::types::schema::OutputSchema
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Output was not a JSON object
    #[error("expected a JSON object, got {found}")]
    NotAnObject { found: String },

    /// A required field is missing
    #[error("missing required field: {field}")]
    MissingField { field: String },

    /// A field has the wrong JSON type
    #[error("field {field} has wrong type: expected {expected}")]
    WrongType { field: String, expected: String },

    /// A field the schema does not declare
    #[error("unknown field: {field}")]
    UnknownField { field: String },
}

/// Result type alias for indexing operations.
pub type Result<T> = std::result::Result<T, IndexError>;

//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that embed the engine
//! without making real provider or network calls.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::ProviderError;
use crate::stores::MemoryVault;
use crate::traits::provider::{ExtractionProvider, ExtractionRequest, ProviderResponse};
use crate::traits::store::DocumentStore;
use crate::types::schema::OutputSchema;

/// A mock extraction provider for testing.
///
/// Returns deterministic, configurable responses without network calls.
/// Failure modes are scripted: a number of leading retryable failures,
/// permanently invalid output, or terminal rejection. Every call is
/// counted so tests can assert the retry budget precisely.
#[derive(Default)]
pub struct MockProvider {
    /// Predefined fields by document path
    responses: Arc<RwLock<HashMap<String, Value>>>,

    /// Fallback fields for paths without a scripted response
    default_response: Arc<RwLock<Option<Value>>>,

    /// Remaining leading calls that fail with a retryable error
    failures_remaining: Arc<AtomicU32>,

    /// Always return output that no schema with required fields accepts
    always_invalid: bool,

    /// Always return a terminal rejection
    always_rejects: bool,

    /// Simulated latency per call
    delay: std::time::Duration,

    /// Total calls observed
    calls: Arc<AtomicUsize>,

    /// Paths called, in order
    called_paths: Arc<RwLock<Vec<String>>>,
}

impl MockProvider {
    /// Create a mock with default behavior (empty-object responses).
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the fields returned for a specific path.
    pub fn with_response(self, path: impl Into<String>, fields: Value) -> Self {
        self.responses.write().unwrap().insert(path.into(), fields);
        self
    }

    /// Script the fields returned for any unscripted path.
    pub fn with_default_response(self, fields: Value) -> Self {
        *self.default_response.write().unwrap() = Some(fields);
        self
    }

    /// Fail the first `n` calls with a retryable server error.
    pub fn fail_times(self, n: u32) -> Self {
        self.failures_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Always return output that fails schema validation.
    pub fn always_invalid(mut self) -> Self {
        self.always_invalid = true;
        self
    }

    /// Always return a terminal bad-request error.
    pub fn always_rejects(mut self) -> Self {
        self.always_rejects = true;
        self
    }

    /// Simulate provider latency.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared call counter, for asserting attempt budgets.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Paths called so far, in order.
    pub fn called_paths(&self) -> Vec<String> {
        self.called_paths.read().unwrap().clone()
    }
}

#[async_trait]
impl ExtractionProvider for MockProvider {
    async fn call(
        &self,
        request: &ExtractionRequest,
        _schema: &OutputSchema,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.called_paths
            .write()
            .unwrap()
            .push(request.path.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.always_rejects {
            return Err(ProviderError::BadRequest {
                message: "mock rejection".into(),
            });
        }

        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ProviderError::Server { status: 503 });
        }

        if self.always_invalid {
            return Ok(ProviderResponse::new(json!({"__invalid__": true})));
        }

        let fields = self
            .responses
            .read()
            .unwrap()
            .get(&request.path)
            .cloned()
            .or_else(|| self.default_response.read().unwrap().clone())
            .unwrap_or_else(|| json!({}));

        Ok(ProviderResponse::new(fields))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Builder for test scenarios: a seeded in-memory vault plus a scripted
/// provider.
pub struct TestScenario {
    vault: Arc<MemoryVault>,
    provider: MockProvider,
}

impl TestScenario {
    /// Create an empty scenario.
    pub fn new() -> Self {
        Self {
            vault: Arc::new(MemoryVault::new()),
            provider: MockProvider::new(),
        }
    }

    /// Add a note with content and the fields the provider extracts
    /// from it.
    pub async fn with_note(self, path: &str, content: &str, fields: Value) -> Self {
        self.vault.write(path, content).await.unwrap();
        Self {
            provider: self.provider.with_response(path, fields),
            vault: self.vault,
        }
    }

    /// Get both collaborators.
    pub fn build(self) -> (Arc<MemoryVault>, MockProvider) {
        (self.vault, self.provider)
    }
}

impl Default for TestScenario {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::schema::FieldKind;

    fn schema() -> OutputSchema {
        OutputSchema::new("note").required_field("title", FieldKind::String, "Title")
    }

    #[tokio::test]
    async fn test_scripted_response_by_path() {
        let provider = MockProvider::new()
            .with_response("notes/a.md", json!({"title": "A"}))
            .with_default_response(json!({"title": "default"}));

        let request = ExtractionRequest::new("notes/a.md", "content", "prompt");
        let response = provider.call(&request, &schema()).await.unwrap();
        assert_eq!(response.fields["title"], "A");

        let other = ExtractionRequest::new("notes/b.md", "content", "prompt");
        let response = provider.call(&other, &schema()).await.unwrap();
        assert_eq!(response.fields["title"], "default");

        assert_eq!(provider.called_paths(), vec!["notes/a.md", "notes/b.md"]);
    }

    #[tokio::test]
    async fn test_fail_times_then_succeeds() {
        let provider = MockProvider::new()
            .with_default_response(json!({"title": "T"}))
            .fail_times(2);
        let request = ExtractionRequest::new("notes/a.md", "content", "prompt");
        let schema = schema();

        assert!(provider.call(&request, &schema).await.is_err());
        assert!(provider.call(&request, &schema).await.is_err());
        assert!(provider.call(&request, &schema).await.is_ok());
        assert_eq!(provider.call_counter().load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_scenario_builder() {
        let scenario = TestScenario::new()
            .with_note("notes/a.md", "alpha", json!({"title": "A"}))
            .await;
        let (vault, provider) = scenario.build();
        assert_eq!(vault.document_count(), 1);

        let request = ExtractionRequest::new("notes/a.md", "alpha", "prompt");
        let response = provider.call(&request, &schema()).await.unwrap();
        assert_eq!(response.fields["title"], "A");
    }
}

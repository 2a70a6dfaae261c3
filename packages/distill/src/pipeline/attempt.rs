//! Per-document extraction attempt - an explicit retry state machine.
//!
//! One attempt run takes a document through
//! `build request → call provider → validate → success | retry | failed`.
//! Transitions are values, not caught exceptions: every step returns the
//! next [`AttemptState`], and the runner loops until `Done`.
//!
//! Numeric semantics: attempts are 1-indexed, and `max_retries = N`
//! allows up to `N + 1` provider calls. The request is built once and
//! resubmitted unchanged on retry. Side effects are bounded: at most one
//! record write on success, exactly one error-sink append on terminal
//! failure, nothing on intermediate retries.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::IndexError;
use crate::hash::content_hash;
use crate::pipeline::prompts::format_extract_prompt;
use crate::traits::provider::{ExtractionProvider, ExtractionRequest, ProviderResponse};
use crate::traits::store::{ErrorSink, RecordStore};
use crate::types::config::IndexConfig;
use crate::types::record::{ExtractionFailure, ExtractionRecord};
use crate::types::schema::OutputSchema;
use crate::types::task::TaskOutcome;

/// States of one extraction attempt.
enum AttemptState {
    /// Call the provider (attempt is 1-indexed)
    Call { attempt: u32 },

    /// Validate the provider's output against the schema
    Validate { attempt: u32, response: ProviderResponse },

    /// A retryable failure occurred; sleep, then call again
    Retry { failed_attempt: u32, reason: String },

    /// Terminal state
    Done(TaskOutcome),
}

/// Runs extraction attempts for single documents.
///
/// Shared by the worker pool executor and the dry-run executor; the
/// latter suppresses the success-persistence side effect.
pub struct AttemptRunner<P, R, S> {
    provider: Arc<P>,
    records: Arc<R>,
    sink: Arc<S>,
    schema: Arc<OutputSchema>,
    config: IndexConfig,
    persist: bool,
}

impl<P, R, S> AttemptRunner<P, R, S>
where
    P: ExtractionProvider,
    R: RecordStore,
    S: ErrorSink,
{
    /// Create a persisting runner.
    pub fn new(
        provider: Arc<P>,
        records: Arc<R>,
        sink: Arc<S>,
        schema: Arc<OutputSchema>,
        config: IndexConfig,
    ) -> Self {
        Self {
            provider,
            records,
            sink,
            schema,
            config,
            persist: true,
        }
    }

    /// Suppress the record write on success (dry-run mode).
    pub fn without_persistence(mut self) -> Self {
        self.persist = false;
        self
    }

    /// Run the full state machine for one document.
    ///
    /// Never returns an error: every failure is captured into the
    /// returned [`TaskOutcome`].
    pub async fn run(&self, path: &str, content: &str) -> TaskOutcome {
        let request = self.build_request(path, content);
        let mut state = AttemptState::Call { attempt: 1 };

        let outcome = loop {
            state = match state {
                AttemptState::Call { attempt } => self.step_call(&request, attempt).await,
                AttemptState::Validate { attempt, response } => {
                    self.step_validate(path, content, attempt, response)
                }
                AttemptState::Retry { failed_attempt, reason } => {
                    debug!(
                        path = %path,
                        attempt = failed_attempt,
                        reason = %reason,
                        "retrying extraction"
                    );
                    tokio::time::sleep(self.config.backoff_for(failed_attempt)).await;
                    AttemptState::Call { attempt: failed_attempt + 1 }
                }
                AttemptState::Done(outcome) => break outcome,
            };
        };

        self.apply_side_effects(path, outcome).await
    }

    /// BUILD_REQUEST: rendered once, reused across retries.
    fn build_request(&self, path: &str, content: &str) -> ExtractionRequest {
        let prompt = format_extract_prompt(&self.schema, content);
        ExtractionRequest::new(path, content, prompt)
    }

    /// CALL_PROVIDER step.
    async fn step_call(&self, request: &ExtractionRequest, attempt: u32) -> AttemptState {
        match self.provider.call(request, &self.schema).await {
            Ok(response) => AttemptState::Validate { attempt, response },
            Err(err) if err.is_retryable() && attempt <= self.config.max_retries => {
                AttemptState::Retry {
                    failed_attempt: attempt,
                    reason: err.to_string(),
                }
            }
            Err(err) => {
                let retryable = err.is_retryable();
                AttemptState::Done(TaskOutcome::Failed {
                    message: terminal_message(err.to_string(), attempt, retryable),
                    attempts: attempt,
                })
            }
        }
    }

    /// VALIDATE step. Validation failures are always retryable.
    fn step_validate(
        &self,
        path: &str,
        content: &str,
        attempt: u32,
        response: ProviderResponse,
    ) -> AttemptState {
        match self.schema.validate(&response.fields) {
            Ok(()) => {
                let provider = response
                    .model
                    .unwrap_or_else(|| self.provider.name().to_string());
                let record = ExtractionRecord::new(path, content_hash(content), response.fields)
                    .with_provider(provider);
                AttemptState::Done(TaskOutcome::Completed(record))
            }
            Err(err) if attempt <= self.config.max_retries => AttemptState::Retry {
                failed_attempt: attempt,
                reason: err.to_string(),
            },
            Err(err) => AttemptState::Done(TaskOutcome::Failed {
                message: terminal_message(err.to_string(), attempt, true),
                attempts: attempt,
            }),
        }
    }

    /// Terminal side effects: one record write on success (unless
    /// suppressed), one sink append on failure. A failed record write
    /// demotes the outcome to a failure.
    async fn apply_side_effects(&self, path: &str, outcome: TaskOutcome) -> TaskOutcome {
        match outcome {
            TaskOutcome::Completed(record) => {
                if !self.persist {
                    return TaskOutcome::Completed(record);
                }
                match self.records.write_record(&record).await {
                    Ok(()) => {
                        debug!(path = %path, "record persisted");
                        TaskOutcome::Completed(record)
                    }
                    Err(err) => {
                        let failed = TaskOutcome::Failed {
                            message: format!("failed to persist record: {}", err),
                            attempts: 0,
                        };
                        self.log_failure(path, &failed).await;
                        failed
                    }
                }
            }
            failed @ TaskOutcome::Failed { .. } => {
                self.log_failure(path, &failed).await;
                failed
            }
        }
    }

    async fn log_failure(&self, path: &str, outcome: &TaskOutcome) {
        let TaskOutcome::Failed { message, attempts } = outcome else {
            return;
        };
        warn!(path = %path, attempts = attempts, error = %message, "extraction failed");
        let entry = ExtractionFailure::new(path, message.clone(), *attempts);
        if let Err(err) = self.sink.append(&entry).await {
            warn!(path = %path, error = %err, "failed to append to error log");
        }
    }
}

/// Message for a terminal failure. A retryable error that ran out of
/// budget is reported as retry exhaustion with its last error; a
/// non-retryable rejection keeps its raw message.
fn terminal_message(last_error: String, attempts: u32, retryable: bool) -> String {
    if retryable {
        IndexError::RetryExhausted {
            attempts,
            message: last_error,
        }
        .to_string()
    } else {
        last_error
    }
}

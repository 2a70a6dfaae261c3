//! Cold-start coordination - full-corpus orchestration.
//!
//! The coordinator enumerates candidate documents, filters them through
//! the exclusion policy and the change detector, and drives either the
//! worker pool (full run) or the sequential dry-run executor over the
//! surviving subset, aggregating everything into an [`IndexResult`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::detect::ChangeDetector;
use crate::error::{IndexError, Result};
use crate::pipeline::attempt::AttemptRunner;
use crate::pipeline::dry_run::{DryRunExecutor, DryRunReport};
use crate::pipeline::pool::{PoolHandle, TaskExecutor, WorkerPool};
use crate::traits::provider::ExtractionProvider;
use crate::traits::store::{DocumentStore, ErrorSink, RecordStore};
use crate::types::config::IndexConfig;
use crate::types::schema::OutputSchema;
use crate::types::task::{PoolEvent, Task, TaskOutcome};

/// Aggregate result of one indexing run.
#[derive(Debug, Clone, Default)]
pub struct IndexResult {
    /// Documents handed to the pool (candidates needing work)
    pub total_notes: usize,

    /// Documents extracted successfully
    pub processed_notes: usize,

    /// Documents that failed terminally
    pub failed_notes: usize,

    /// Documents skipped because their content was unchanged
    pub skipped_unchanged: usize,

    /// Documents skipped by the exclusion policy
    pub skipped_excluded: usize,

    /// Path + message for every failure
    pub errors: Vec<IndexErrorEntry>,
}

impl IndexResult {
    /// Whether every candidate was processed successfully.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// One failed document in an [`IndexResult`].
#[derive(Debug, Clone)]
pub struct IndexErrorEntry {
    /// Document path that failed
    pub path: String,

    /// Last error message
    pub message: String,
}

/// The filtered work list for one run.
struct IndexPlan {
    tasks: Vec<Task>,
    skipped_unchanged: usize,
    skipped_excluded: usize,
    read_failures: Vec<IndexErrorEntry>,
}

impl IndexPlan {
    fn empty_result(&self) -> IndexResult {
        IndexResult {
            total_notes: self.read_failures.len(),
            processed_notes: 0,
            failed_notes: self.read_failures.len(),
            skipped_unchanged: self.skipped_unchanged,
            skipped_excluded: self.skipped_excluded,
            errors: self.read_failures.clone(),
        }
    }
}

/// Pool executor: read the document, run the attempt state machine.
struct ExtractExecutor<D, P, R, S> {
    documents: Arc<D>,
    runner: AttemptRunner<P, R, S>,
}

#[async_trait]
impl<D, P, R, S> TaskExecutor for ExtractExecutor<D, P, R, S>
where
    D: DocumentStore + 'static,
    P: ExtractionProvider + 'static,
    R: RecordStore + 'static,
    S: ErrorSink + 'static,
{
    async fn execute(&self, task: &Task) -> TaskOutcome {
        let content = match self.documents.read(&task.path).await {
            Ok(Some(content)) => content,
            Ok(None) => {
                return TaskOutcome::Failed {
                    message: IndexError::NotFound {
                        path: task.path.clone(),
                    }
                    .to_string(),
                    attempts: 0,
                }
            }
            Err(err) => {
                return TaskOutcome::Failed {
                    message: format!("failed to read document: {}", err),
                    attempts: 0,
                }
            }
        };

        self.runner.run(&task.path, &content).await
    }
}

/// A spawned indexing run with an explicit control handle.
pub struct IndexRun {
    handle: PoolHandle,
    events: Option<mpsc::Receiver<PoolEvent>>,
    join: JoinHandle<Result<IndexResult>>,
}

impl IndexRun {
    /// Control handle for pause/resume/cancel/status.
    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    /// Take the pool event stream. Returns `None` after the first call.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<PoolEvent>> {
        self.events.take()
    }

    /// Await the run's aggregate result.
    pub async fn join(self) -> Result<IndexResult> {
        self.join.await.map_err(|err| IndexError::Config {
            reason: format!("index run panicked: {}", err),
        })?
    }
}

/// Full-corpus indexing coordinator.
///
/// # Example
///
/// ```rust,ignore
/// use distill::{Indexer, IndexConfig, MemoryVault, OutputSchema};
/// use distill::testing::MockProvider;
///
/// let vault = Arc::new(MemoryVault::new());
/// let indexer = Indexer::new(
///     vault.clone(), vault.clone(), Arc::new(provider), vault,
///     schema, IndexConfig::new("notes"),
/// );
///
/// let result = indexer.cold_start().await?;
/// println!("{} extracted, {} failed", result.processed_notes, result.failed_notes);
/// ```
pub struct Indexer<D, R, P, S> {
    documents: Arc<D>,
    records: Arc<R>,
    provider: Arc<P>,
    sink: Arc<S>,
    schema: Arc<OutputSchema>,
    config: IndexConfig,
}

impl<D, R, P, S> Clone for Indexer<D, R, P, S> {
    fn clone(&self) -> Self {
        Self {
            documents: Arc::clone(&self.documents),
            records: Arc::clone(&self.records),
            provider: Arc::clone(&self.provider),
            sink: Arc::clone(&self.sink),
            schema: Arc::clone(&self.schema),
            config: self.config.clone(),
        }
    }
}

impl<D, R, P, S> Indexer<D, R, P, S>
where
    D: DocumentStore + 'static,
    R: RecordStore + 'static,
    P: ExtractionProvider + 'static,
    S: ErrorSink + 'static,
{
    /// Create a coordinator over the given collaborators.
    pub fn new(
        documents: Arc<D>,
        records: Arc<R>,
        provider: Arc<P>,
        sink: Arc<S>,
        schema: OutputSchema,
        config: IndexConfig,
    ) -> Self {
        Self {
            documents,
            records,
            provider,
            sink,
            schema: Arc::new(schema),
            config,
        }
    }

    /// Run a full cold-start pass and await its aggregate result.
    ///
    /// An empty candidate set returns immediately without constructing a
    /// pool.
    pub async fn cold_start(&self) -> Result<IndexResult> {
        let plan = self.plan().await?;
        if plan.tasks.is_empty() {
            info!(
                skipped_unchanged = plan.skipped_unchanged,
                skipped_excluded = plan.skipped_excluded,
                "nothing to index"
            );
            return Ok(plan.empty_result());
        }

        let pool = self.build_pool();
        self.execute_plan(plan, &pool).await
    }

    /// Spawn a cold-start pass, returning a handle that owns the pool's
    /// lifecycle: pause, resume, cancel, status, and the event stream.
    ///
    /// The pool is constructed eagerly so the handle is live from the
    /// first instant; an empty candidate set completes the run without
    /// ever starting the pool's workers.
    pub fn spawn(&self) -> IndexRun {
        let pool = self.build_pool();
        let handle = pool.handle();
        let events = pool.take_events();
        let this = self.clone();

        let join = tokio::spawn(async move {
            let plan = this.plan().await?;
            if plan.tasks.is_empty() {
                return Ok(plan.empty_result());
            }
            this.execute_plan(plan, &pool).await
        });

        IndexRun { handle, events, join }
    }

    /// Run a sequential, persistence-suppressing preview over at most
    /// `dry_run_limit` candidates.
    pub async fn dry_run(&self) -> Result<DryRunReport> {
        let plan = self.plan().await?;
        let mut candidates: Vec<_> = plan.tasks.into_iter().map(|task| task.path).collect();
        if candidates.len() > self.config.dry_run_limit {
            info!(
                candidates = candidates.len(),
                limit = self.config.dry_run_limit,
                "capping dry run"
            );
            candidates.truncate(self.config.dry_run_limit);
        }

        let executor = DryRunExecutor::new(
            Arc::clone(&self.documents),
            Arc::clone(&self.records),
            self.attempt_runner().without_persistence(),
        );
        Ok(executor.run(candidates).await)
    }

    /// Enumerate, exclude, and change-detect, producing the work list.
    async fn plan(&self) -> Result<IndexPlan> {
        let paths = self.documents.list(&self.config.root).await?;
        info!(root = %self.config.root, documents = paths.len(), "enumerated vault");

        let detector = ChangeDetector::new(Arc::clone(&self.records));
        let mut plan = IndexPlan {
            tasks: Vec::new(),
            skipped_unchanged: 0,
            skipped_excluded: 0,
            read_failures: Vec::new(),
        };

        for path in paths {
            if !self.config.filter.matches(&path) {
                debug!(path = %path, "excluded by policy");
                plan.skipped_excluded += 1;
                continue;
            }

            let content = match self.documents.read(&path).await {
                Ok(Some(content)) => content,
                Ok(None) => {
                    // Listed but gone before we could read it.
                    plan.read_failures.push(IndexErrorEntry {
                        message: IndexError::NotFound { path: path.clone() }.to_string(),
                        path,
                    });
                    continue;
                }
                Err(err) => {
                    warn!(path = %path, error = %err, "failed to read document");
                    plan.read_failures.push(IndexErrorEntry {
                        path: path.clone(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            match detector.classify(&path, &content).await? {
                Some(kind) => plan.tasks.push(Task::new(kind, path)),
                None => plan.skipped_unchanged += 1,
            }
        }

        info!(
            candidates = plan.tasks.len(),
            skipped_unchanged = plan.skipped_unchanged,
            skipped_excluded = plan.skipped_excluded,
            "planned indexing run"
        );
        Ok(plan)
    }

    fn attempt_runner(&self) -> AttemptRunner<P, R, S> {
        AttemptRunner::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.records),
            Arc::clone(&self.sink),
            Arc::clone(&self.schema),
            self.config.clone(),
        )
    }

    fn build_pool(&self) -> WorkerPool<ExtractExecutor<D, P, R, S>> {
        let executor = ExtractExecutor {
            documents: Arc::clone(&self.documents),
            runner: self.attempt_runner(),
        };
        WorkerPool::new(executor, self.config.concurrency, self.config.event_buffer)
    }

    /// Drive the pool over the planned tasks and aggregate results.
    async fn execute_plan(
        &self,
        plan: IndexPlan,
        pool: &WorkerPool<ExtractExecutor<D, P, R, S>>,
    ) -> Result<IndexResult> {
        let task_count = plan.tasks.len();
        for task in plan.tasks {
            match pool.enqueue(task) {
                Ok(()) => {}
                // Cancelled mid-enqueue: stop feeding, aggregate what ran.
                Err(IndexError::Cancelled) => break,
                Err(err) => return Err(err),
            }
        }
        pool.close();
        pool.start();
        pool.wait_for_completion().await;
        pool.join().await;

        let mut result = IndexResult {
            total_notes: task_count + plan.read_failures.len(),
            skipped_unchanged: plan.skipped_unchanged,
            skipped_excluded: plan.skipped_excluded,
            failed_notes: plan.read_failures.len(),
            errors: plan.read_failures,
            ..Default::default()
        };

        // Completion order across workers is unordered; aggregation must
        // not assume it matches enqueue order.
        for task_result in pool.take_results() {
            match task_result.outcome {
                TaskOutcome::Completed(_) => result.processed_notes += 1,
                TaskOutcome::Failed { message, .. } => {
                    result.failed_notes += 1;
                    result.errors.push(IndexErrorEntry {
                        path: task_result.path,
                        message,
                    });
                }
            }
        }

        info!(
            total = result.total_notes,
            processed = result.processed_notes,
            failed = result.failed_notes,
            "indexing run finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryVault;
    use crate::testing::MockProvider;
    use crate::types::config::PathFilter;
    use crate::types::schema::FieldKind;
    use serde_json::json;

    fn schema() -> OutputSchema {
        OutputSchema::new("note").required_field("title", FieldKind::String, "Title")
    }

    async fn seeded_vault(notes: &[(&str, &str)]) -> Arc<MemoryVault> {
        let vault = Arc::new(MemoryVault::new());
        for (path, content) in notes {
            vault.write(path, content).await.unwrap();
        }
        vault
    }

    fn indexer(
        vault: Arc<MemoryVault>,
        provider: MockProvider,
        config: IndexConfig,
    ) -> Indexer<MemoryVault, MemoryVault, MockProvider, MemoryVault> {
        Indexer::new(
            vault.clone(),
            vault.clone(),
            Arc::new(provider),
            vault,
            schema(),
            config,
        )
    }

    #[tokio::test]
    async fn test_empty_vault_returns_immediately() {
        let vault = seeded_vault(&[]).await;
        let indexer = indexer(vault, MockProvider::new(), IndexConfig::new("notes"));

        let result = indexer.cold_start().await.unwrap();
        assert_eq!(result.total_notes, 0);
        assert_eq!(result.processed_notes, 0);
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_cold_start_processes_all_candidates() {
        let vault = seeded_vault(&[
            ("notes/a.md", "alpha"),
            ("notes/b.md", "beta"),
            ("notes/c.md", "gamma"),
        ])
        .await;
        let provider = MockProvider::new().with_default_response(json!({"title": "T"}));
        let indexer = indexer(vault.clone(), provider, IndexConfig::new("notes"));

        let result = indexer.cold_start().await.unwrap();
        assert_eq!(result.total_notes, 3);
        assert_eq!(result.processed_notes, 3);
        assert_eq!(result.failed_notes, 0);
        assert_eq!(vault.record_count(), 3);
    }

    #[tokio::test]
    async fn test_second_run_skips_unchanged() {
        let vault = seeded_vault(&[("notes/a.md", "alpha"), ("notes/b.md", "beta")]).await;
        let provider = MockProvider::new().with_default_response(json!({"title": "T"}));
        let indexer = indexer(vault, provider, IndexConfig::new("notes"));

        let first = indexer.cold_start().await.unwrap();
        assert_eq!(first.processed_notes, 2);

        let second = indexer.cold_start().await.unwrap();
        assert_eq!(second.total_notes, 0);
        assert_eq!(second.processed_notes, 0);
        assert_eq!(second.failed_notes, 0);
        assert_eq!(second.skipped_unchanged, 2);
    }

    #[tokio::test]
    async fn test_exclusions_tracked_separately() {
        let vault = seeded_vault(&[
            ("notes/a.md", "alpha"),
            ("notes/templates/t.md", "template"),
        ])
        .await;
        let provider = MockProvider::new().with_default_response(json!({"title": "T"}));
        let config = IndexConfig::new("notes")
            .with_filter(PathFilter::new().excluding("notes/templates/"));
        let indexer = indexer(vault, provider, config);

        let result = indexer.cold_start().await.unwrap();
        assert_eq!(result.processed_notes, 1);
        assert_eq!(result.skipped_excluded, 1);
    }

    #[tokio::test]
    async fn test_failures_surface_in_errors() {
        let vault = seeded_vault(&[("notes/a.md", "alpha"), ("notes/b.md", "beta")]).await;
        let provider = MockProvider::new()
            .with_default_response(json!({"title": "T"}))
            .with_response("notes/b.md", json!({"wrong": true}));
        let config = IndexConfig::new("notes").with_max_retries(0);
        let indexer = indexer(vault, provider, config);

        let result = indexer.cold_start().await.unwrap();
        assert_eq!(result.processed_notes, 1);
        assert_eq!(result.failed_notes, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "notes/b.md");
        assert_eq!(
            result.total_notes,
            result.processed_notes + result.failed_notes
        );
    }

    #[tokio::test]
    async fn test_spawned_run_exposes_control() {
        let vault = seeded_vault(&[("notes/a.md", "alpha")]).await;
        let provider = MockProvider::new().with_default_response(json!({"title": "T"}));
        let indexer = indexer(vault, provider, IndexConfig::new("notes"));

        let mut run = indexer.spawn();
        assert!(run.take_events().is_some());
        let result = run.join().await.unwrap();
        assert_eq!(result.processed_notes, 1);
    }
}

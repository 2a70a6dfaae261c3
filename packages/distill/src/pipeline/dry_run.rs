//! Dry-run execution - sequential, persistence-suppressing preview.
//!
//! Runs the same attempt logic as a full run, strictly one document at a
//! time, with the success-persistence side effect suppressed. Used to
//! validate extraction quality on a small sample before committing to a
//! full, concurrent, persisting run.

use std::sync::Arc;

use async_stream::stream;
use futures::Stream;
use tracing::{debug, info};

use crate::detect::ChangeDetector;
use crate::error::IndexError;
use crate::pipeline::attempt::AttemptRunner;
use crate::traits::provider::ExtractionProvider;
use crate::traits::store::{DocumentStore, ErrorSink, RecordStore};
use crate::types::record::ExtractionRecord;
use crate::types::task::TaskOutcome;

/// Per-document outcome of a dry run.
#[derive(Debug, Clone)]
pub struct DryRunOutcome {
    /// Document path
    pub path: String,

    /// What happened
    pub status: DryRunStatus,
}

/// Status of one previewed document.
#[derive(Debug, Clone)]
pub enum DryRunStatus {
    /// Extraction succeeded; the record was *not* persisted
    Extracted(ExtractionRecord),

    /// Extraction failed terminally
    Failed { message: String, attempts: u32 },

    /// Content unchanged since the stored record; nothing to do
    SkippedUnchanged,
}

/// Aggregate summary of a dry run.
#[derive(Debug, Clone, Default)]
pub struct DryRunReport {
    /// Per-document outcomes, in processing order
    pub outcomes: Vec<DryRunOutcome>,

    /// Documents extracted successfully
    pub processed: usize,

    /// Documents that failed
    pub failed: usize,

    /// Documents skipped as unchanged
    pub skipped: usize,
}

impl DryRunReport {
    fn record(&mut self, outcome: DryRunOutcome) {
        match outcome.status {
            DryRunStatus::Extracted(_) => self.processed += 1,
            DryRunStatus::Failed { .. } => self.failed += 1,
            DryRunStatus::SkippedUnchanged => self.skipped += 1,
        }
        self.outcomes.push(outcome);
    }
}

/// Sequential preview executor.
pub struct DryRunExecutor<D, P, R, S> {
    documents: Arc<D>,
    detector: ChangeDetector<R>,
    runner: AttemptRunner<P, R, S>,
}

impl<D, P, R, S> DryRunExecutor<D, P, R, S>
where
    D: DocumentStore,
    P: ExtractionProvider,
    R: RecordStore,
    S: ErrorSink,
{
    /// Create a dry-run executor. The runner must already have
    /// persistence suppressed.
    pub fn new(
        documents: Arc<D>,
        records: Arc<R>,
        runner: AttemptRunner<P, R, S>,
    ) -> Self {
        Self {
            documents,
            detector: ChangeDetector::new(records),
            runner,
        }
    }

    /// Preview the given documents strictly sequentially.
    pub async fn run(&self, paths: Vec<String>) -> DryRunReport {
        let mut report = DryRunReport::default();
        for path in paths {
            report.record(self.preview(path).await);
        }

        info!(
            processed = report.processed,
            failed = report.failed,
            skipped = report.skipped,
            "dry run finished"
        );
        report
    }

    /// Stream per-document outcomes as they are produced.
    pub fn stream(&self, paths: Vec<String>) -> impl Stream<Item = DryRunOutcome> + '_ {
        stream! {
            for path in paths {
                yield self.preview(path).await;
            }
        }
    }

    /// Preview a single document.
    async fn preview(&self, path: String) -> DryRunOutcome {
        debug!(path = %path, "dry-run preview");

        let content = match self.documents.read(&path).await {
            Ok(Some(content)) => content,
            Ok(None) => {
                return DryRunOutcome {
                    status: DryRunStatus::Failed {
                        message: IndexError::NotFound { path: path.clone() }.to_string(),
                        attempts: 0,
                    },
                    path,
                }
            }
            Err(err) => {
                return DryRunOutcome {
                    status: DryRunStatus::Failed {
                        message: err.to_string(),
                        attempts: 0,
                    },
                    path,
                }
            }
        };

        match self.detector.classify(&path, &content).await {
            Ok(None) => {
                return DryRunOutcome {
                    path,
                    status: DryRunStatus::SkippedUnchanged,
                }
            }
            Ok(Some(_)) => {}
            Err(err) => {
                return DryRunOutcome {
                    status: DryRunStatus::Failed {
                        message: err.to_string(),
                        attempts: 0,
                    },
                    path,
                }
            }
        }

        let status = match self.runner.run(&path, &content).await {
            TaskOutcome::Completed(record) => DryRunStatus::Extracted(record),
            TaskOutcome::Failed { message, attempts } => DryRunStatus::Failed { message, attempts },
        };
        DryRunOutcome { path, status }
    }
}

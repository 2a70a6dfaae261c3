//! Task types - units of work flowing through the worker pool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::record::ExtractionRecord;

/// Unique identifier for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generate a fresh task id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Why a document was scheduled for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// No stored record exists for this path
    Extract,
    /// A record exists but its content hash no longer matches
    Reextract,
}

/// A unit of work: "(re)extract one document into a record".
///
/// Identity is the target document path; the pool enforces at most one
/// live task per path per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique id for this task instance
    pub id: TaskId,

    /// Why this document was scheduled
    pub kind: TaskKind,

    /// Target document path (the task's identity)
    pub path: String,

    /// When the task was created
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a new task for a document path.
    pub fn new(kind: TaskKind, path: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            kind,
            path: path.into(),
            created_at: Utc::now(),
        }
    }
}

/// Outcome of a consumed task. Exactly one is emitted per task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Id of the task this result retires
    pub task_id: TaskId,

    /// Target document path
    pub path: String,

    /// What happened
    pub outcome: TaskOutcome,
}

impl TaskResult {
    /// Whether the task completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Completed(_))
    }
}

/// Terminal outcome of one task.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    /// Extraction succeeded and produced a record
    Completed(ExtractionRecord),

    /// Extraction failed after exhausting its attempt budget
    Failed {
        /// Last error message
        message: String,
        /// Total provider calls made (1-indexed)
        attempts: u32,
    },
}

/// A snapshot of pool progress.
///
/// Invariant: `total == completed + failed + pending + in_flight` at every
/// observation point. Counters are updated under a single lock so no
/// observer ever sees a partially applied transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Tasks enqueued over the pool's lifetime
    pub total: usize,

    /// Tasks that completed successfully
    pub completed: usize,

    /// Tasks that failed
    pub failed: usize,

    /// Tasks waiting in the queue
    pub pending: usize,

    /// Tasks currently executing
    pub in_flight: usize,

    /// Whether dispatch has been started and not cancelled
    pub is_running: bool,

    /// Whether dispatch is paused
    pub is_paused: bool,
}

impl QueueStatus {
    /// Tasks retired so far (success or failure).
    pub fn retired(&self) -> usize {
        self.completed + self.failed
    }

    /// Whether every enqueued task has been retired.
    pub fn is_drained(&self) -> bool {
        self.pending == 0 && self.in_flight == 0
    }
}

/// Events emitted by the pool over its bounded event channel.
///
/// The channel replaces completion/progress callbacks: the pool publishes
/// with a non-blocking send and drops events when the consumer lags, so a
/// slow host can never stall dispatch. Authoritative results are
/// aggregated inside the pool and drained at the end of the run.
#[derive(Debug, Clone)]
pub enum PoolEvent {
    /// A task was retired (success or failure)
    TaskCompleted(TaskResult),

    /// Progress snapshot taken immediately after a task retired
    Progress(QueueStatus),
}

//! The indexing pipeline: attempt state machine, worker pool,
//! cold-start coordination, and dry-run preview.

pub mod attempt;
pub mod coordinator;
pub mod dry_run;
pub mod pool;
pub mod prompts;

pub use attempt::AttemptRunner;
pub use coordinator::{IndexErrorEntry, IndexResult, IndexRun, Indexer};
pub use dry_run::{DryRunExecutor, DryRunOutcome, DryRunReport, DryRunStatus};
pub use pool::{PoolHandle, TaskExecutor, WorkerPool};
pub use prompts::{extract_prompt_hash, format_extract_prompt, EXTRACT_SYSTEM_PROMPT};

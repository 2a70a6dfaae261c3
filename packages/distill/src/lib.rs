//! Incremental Structured-Note Extraction Engine
//!
//! An orchestration library that turns a vault of unstructured text
//! notes into schema-validated structured records, reprocessing only
//! what changed, under bounded concurrency, with governed retries and
//! pausable/cancellable execution.
//!
//! # Design Philosophy
//!
//! - Incremental by default: content hashes decide what gets reprocessed
//! - Failures are data: per-document errors are captured and aggregated,
//!   never allowed to poison a run
//! - Explicit control: runs hand back a control handle; there is no
//!   ambient "current pool" state
//! - Library handles mechanics, host handles semantics (commands,
//!   scheduling, persistence locations)
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use distill::{IndexConfig, Indexer, MemoryVault, OutputSchema, FieldKind};
//! use distill::providers::{HttpProvider, HttpProviderConfig, ProviderKind};
//!
//! let vault = Arc::new(MemoryVault::new());
//! let provider = Arc::new(HttpProvider::new(
//!     HttpProviderConfig::new(ProviderKind::Ollama, "http://localhost:11434", "llama3"),
//! )?);
//!
//! let schema = OutputSchema::new("contact")
//!     .required_field("name", FieldKind::String, "Person's full name")
//!     .field("topics", FieldKind::StringList, "Topics discussed");
//!
//! let indexer = Indexer::new(
//!     vault.clone(), vault.clone(), provider, vault.clone(),
//!     schema, IndexConfig::new("notes").with_concurrency(3),
//! );
//!
//! // Preview on a sample first...
//! let report = indexer.dry_run().await?;
//!
//! // ...then run for real, with a control handle.
//! let mut run = indexer.spawn();
//! let handle = run.handle();   // pause / resume / cancel / status
//! let result = run.join().await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait abstractions (DocumentStore, RecordStore,
//!   ErrorSink, ExtractionProvider)
//! - [`types`] - Tasks, records, schemas, configuration
//! - [`pipeline`] - Attempt state machine, worker pool, coordinator,
//!   dry-run executor
//! - [`providers`] - Wire-format strategies and the HTTP transport
//! - [`security`] - Credential handling
//! - [`stores`] - Storage implementations (MemoryVault, FsVault)
//! - [`testing`] - Mock implementations for testing

pub mod detect;
pub mod error;
pub mod hash;
pub mod pipeline;
pub mod providers;
pub mod security;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use detect::ChangeDetector;
pub use error::{IndexError, ProviderError, Result, ValidationError};
pub use hash::{content_hash, normalize};
pub use traits::{
    provider::{ExtractionProvider, ExtractionRequest, ProviderResponse},
    store::{DocumentStore, ErrorSink, RecordStore},
};
pub use types::{
    config::{IndexConfig, PathFilter},
    record::{ExtractionFailure, ExtractionRecord, RecordStatus},
    schema::{FieldKind, FieldSpec, OutputSchema},
    task::{PoolEvent, QueueStatus, Task, TaskId, TaskKind, TaskOutcome, TaskResult},
};

// Re-export pipeline components
pub use pipeline::{
    AttemptRunner, DryRunExecutor, DryRunOutcome, DryRunReport, DryRunStatus, IndexErrorEntry,
    IndexResult, IndexRun, Indexer, PoolHandle, TaskExecutor, WorkerPool,
};

// Re-export stores
pub use stores::{FsVault, MemoryVault};

// Re-export security primitives
pub use security::SecretString;

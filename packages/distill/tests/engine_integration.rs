//! End-to-end tests of the indexing engine over the in-memory vault and
//! the mock provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use distill::providers::ProviderExt;
use distill::testing::MockProvider;
use distill::{
    content_hash, DocumentStore, ExtractionProvider, ExtractionRequest, FieldKind, FsVault,
    IndexConfig, Indexer, MemoryVault, OutputSchema, PoolEvent, ProviderError, ProviderResponse,
    RecordStore,
};

fn schema() -> OutputSchema {
    OutputSchema::new("note")
        .required_field("title", FieldKind::String, "Note title")
        .field("tags", FieldKind::StringList, "Tags mentioned in the note")
}

async fn seeded_vault(count: usize) -> Arc<MemoryVault> {
    let vault = Arc::new(MemoryVault::new());
    for i in 0..count {
        vault
            .write(&format!("notes/{i:02}.md"), &format!("note body {i}"))
            .await
            .unwrap();
    }
    vault
}

fn indexer<P: ExtractionProvider + 'static>(
    vault: Arc<MemoryVault>,
    provider: P,
    config: IndexConfig,
) -> Indexer<MemoryVault, MemoryVault, P, MemoryVault> {
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
async fn idempotence_second_run_is_all_skips() {
    let vault = seeded_vault(4).await;
    let provider = MockProvider::new().with_default_response(json!({"title": "T"}));
    let indexer = indexer(vault, provider, IndexConfig::new("notes"));

    let first = indexer.cold_start().await.unwrap();
    assert_eq!(first.processed_notes, 4);

    let second = indexer.cold_start().await.unwrap();
    assert_eq!(second.processed_notes, 0);
    assert_eq!(second.failed_notes, 0);
    assert_eq!(second.skipped_unchanged, 4);
}

#[tokio::test]
async fn editing_one_note_reprocesses_only_that_note() {
    let vault = seeded_vault(3).await;
    let provider = MockProvider::new().with_default_response(json!({"title": "T"}));
    let indexer = indexer(vault.clone(), provider, IndexConfig::new("notes"));

    indexer.cold_start().await.unwrap();
    vault.write("notes/01.md", "edited body").await.unwrap();

    let second = indexer.cold_start().await.unwrap();
    assert_eq!(second.total_notes, 1);
    assert_eq!(second.processed_notes, 1);
    assert_eq!(second.skipped_unchanged, 2);

    let record = vault.read_record("notes/01.md").await.unwrap().unwrap();
    assert_eq!(record.content_hash, content_hash("edited body"));
}

#[tokio::test]
async fn conservation_and_exactly_once_with_five_tasks_two_workers() {
    let vault = seeded_vault(5).await;
    let provider = MockProvider::new()
        .with_default_response(json!({"title": "T"}))
        .with_response("notes/03.md", json!({"unexpected": 1}));
    let config = IndexConfig::new("notes")
        .with_concurrency(2)
        .with_max_retries(0);
    let indexer = indexer(vault, provider, config);

    let mut run = indexer.spawn();
    let mut events = run.take_events().unwrap();
    let handle = run.handle();
    let result = run.join().await.unwrap();

    assert_eq!(result.total_notes, 5);
    assert_eq!(result.processed_notes + result.failed_notes, 5);
    assert_eq!(result.failed_notes, 1);

    // Exactly one completion event per task, and a drained queue.
    let mut completions = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, PoolEvent::TaskCompleted(_)) {
            completions += 1;
        }
    }
    assert_eq!(completions, 5);

    let status = handle.status();
    assert_eq!(status.pending, 0);
    assert_eq!(status.in_flight, 0);
}

#[tokio::test]
async fn retry_bound_is_max_retries_plus_one_with_one_sink_entry() {
    let vault = seeded_vault(1).await;
    let provider = MockProvider::new().always_invalid();
    let calls = provider.call_counter();
    let config = IndexConfig::new("notes")
        .with_max_retries(2)
        .with_retry_backoff(Duration::from_millis(1));
    let indexer = indexer(vault.clone(), provider, config);

    let result = indexer.cold_start().await.unwrap();
    assert_eq!(result.failed_notes, 1);
    assert_eq!(result.errors.len(), 1);

    // maxRetries = 2 means exactly 3 provider calls.
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let failures = vault.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].attempts, 3);
    assert_eq!(failures[0].path, "notes/00.md");
}

#[tokio::test]
async fn dry_run_never_persists_and_respects_cap() {
    let vault = seeded_vault(5).await;
    let provider = MockProvider::new().with_default_response(json!({"title": "T"}));
    let config = IndexConfig::new("notes").with_dry_run_limit(2);
    let indexer = indexer(vault.clone(), provider, config);

    let report = indexer.dry_run().await.unwrap();
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.processed, 2);
    assert_eq!(vault.record_write_count(), 0);
    assert_eq!(vault.record_count(), 0);

    // A real run afterwards still sees every note as new.
    let result = indexer.cold_start().await.unwrap();
    assert_eq!(result.processed_notes, 5);
}

/// Provider that tracks how many calls run simultaneously.
struct ConcurrencyProbe {
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyProbe {
    fn new() -> Self {
        Self {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ExtractionProvider for ConcurrencyProbe {
    async fn call(
        &self,
        _request: &ExtractionRequest,
        _schema: &OutputSchema,
    ) -> Result<ProviderResponse, ProviderError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(15)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(ProviderResponse::new(json!({"title": "T"})))
    }

    fn name(&self) -> &str {
        "probe"
    }
}

#[tokio::test]
async fn concurrency_bound_is_never_exceeded() {
    let vault = seeded_vault(9).await;
    let probe = Arc::new(ConcurrencyProbe::new());
    let config = IndexConfig::new("notes").with_concurrency(2);
    let indexer = Indexer::new(
        vault.clone(),
        vault.clone(),
        probe.clone(),
        vault,
        schema(),
        config,
    );

    let result = indexer.cold_start().await.unwrap();
    assert_eq!(result.processed_notes, 9);
    assert!(probe.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn pause_and_resume_complete_without_duplicates() {
    let vault = seeded_vault(10).await;
    let provider = MockProvider::new()
        .with_default_response(json!({"title": "T"}))
        .with_delay(Duration::from_millis(20));
    let calls = provider.call_counter();
    let config = IndexConfig::new("notes").with_concurrency(2);
    let indexer = indexer(vault, provider, config);

    let run = indexer.spawn();
    let handle = run.handle();
    handle.pause();

    // Paused: at most the already-dispatched tasks can finish.
    tokio::time::sleep(Duration::from_millis(80)).await;
    let paused_status = handle.status();
    assert!(paused_status.is_paused);
    assert!(paused_status.completed <= 2);

    handle.resume();
    let result = run.join().await.unwrap();

    assert_eq!(result.processed_notes, 10);
    assert_eq!(result.failed_notes, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn cancel_stops_dispatch_mid_run() {
    let vault = seeded_vault(6).await;
    let provider = MockProvider::new()
        .with_default_response(json!({"title": "T"}))
        .with_delay(Duration::from_millis(100));
    let config = IndexConfig::new("notes").with_concurrency(1);
    let indexer = indexer(vault, provider, config);

    let run = indexer.spawn();
    let handle = run.handle();

    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();
    let result = run.join().await.unwrap();

    assert_eq!(result.total_notes, 6);
    assert!(result.processed_notes + result.failed_notes < 6);

    let status = handle.status();
    assert!(status.pending > 0);
    assert!(!status.is_running);
}

#[tokio::test]
async fn rate_limited_provider_composes_with_the_engine() {
    let vault = seeded_vault(3).await;
    let provider = MockProvider::new()
        .with_default_response(json!({"title": "T"}))
        .rate_limited(50);
    let indexer = indexer(vault, provider, IndexConfig::new("notes"));

    let result = indexer.cold_start().await.unwrap();
    assert_eq!(result.processed_notes, 3);
}

#[tokio::test]
async fn filesystem_vault_round_trip() {
    let dir = tempfile::TempDir::new().unwrap();
    let vault = Arc::new(FsVault::open(dir.path()).await.unwrap());
    vault.write("notes/a.md", "# Alpha\n\nBody").await.unwrap();
    vault.write("notes/b.md", "# Beta\n\nBody").await.unwrap();

    let provider = MockProvider::new().with_default_response(json!({"title": "T"}));
    let indexer = Indexer::new(
        vault.clone(),
        vault.clone(),
        Arc::new(provider),
        vault.clone(),
        schema(),
        IndexConfig::new("notes"),
    );

    let first = indexer.cold_start().await.unwrap();
    assert_eq!(first.processed_notes, 2);

    // Records landed on disk and suppress reprocessing across "restarts".
    let reopened = Arc::new(FsVault::open(dir.path()).await.unwrap());
    let record = reopened.read_record("notes/a.md").await.unwrap().unwrap();
    assert_eq!(record.fields["title"], "T");

    let second = indexer.cold_start().await.unwrap();
    assert_eq!(second.processed_notes, 0);
    assert_eq!(second.skipped_unchanged, 2);
}

#[tokio::test]
async fn transient_provider_failures_recover_within_budget() {
    let vault = seeded_vault(1).await;
    let provider = MockProvider::new()
        .with_default_response(json!({"title": "T"}))
        .fail_times(2);
    let config = IndexConfig::new("notes")
        .with_max_retries(2)
        .with_retry_backoff(Duration::from_millis(1));
    let indexer = indexer(vault.clone(), provider, config);

    let result = indexer.cold_start().await.unwrap();
    assert_eq!(result.processed_notes, 1);
    assert_eq!(result.failed_notes, 0);
    assert_eq!(vault.failure_count(), 0);
}

#[tokio::test]
async fn terminal_failures_append_error_log_entries() {
    let vault = seeded_vault(2).await;
    let provider = MockProvider::new()
        .with_default_response(json!({"title": "T"}))
        .with_response("notes/01.md", json!({"no_title": true}));
    let config = IndexConfig::new("notes")
        .with_max_retries(1)
        .with_retry_backoff(Duration::from_millis(1));
    let indexer = indexer(vault.clone(), provider, config);

    let result = indexer.cold_start().await.unwrap();
    assert_eq!(result.failed_notes, 1);
    assert_eq!(result.errors[0].path, "notes/01.md");

    let failures = vault.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].attempts, 2);

    // Appends accumulate across runs rather than replacing earlier entries.
    vault.write("notes/01.md", "still broken").await.unwrap();
    indexer.cold_start().await.unwrap();
    assert_eq!(vault.failure_count(), 2);
}

//! Worker pool - bounded-concurrency task execution with pause, resume,
//! and cancel.
//!
//! A fixed number of workers drain one FIFO queue. The queue and its
//! counters live behind a single mutex, so every status transition is one
//! indivisible mutation and no observer sees a half-applied count.
//! Dispatch is gated on a `watch`-driven state machine
//! (running / paused / cancelled); pause and cancel are cooperative and
//! never abort an in-flight task.
//!
//! Progress and completion flow through a bounded event channel published
//! with a non-blocking send: a slow consumer causes dropped events, never
//! a stalled pool. Authoritative results accumulate inside the pool and
//! are drained with [`WorkerPool::take_results`].

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{IndexError, Result};
use crate::types::task::{PoolEvent, QueueStatus, Task, TaskOutcome, TaskResult};

/// Executes one task. Failures are captured into the outcome, never
/// raised: a task's internal failure must not poison the pool.
#[async_trait]
pub trait TaskExecutor: Send + Sync + 'static {
    /// Execute a task to its terminal outcome.
    async fn execute(&self, task: &Task) -> TaskOutcome;
}

/// Dispatch state of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolState {
    /// Workers may take new tasks
    Running,
    /// No new dispatch; in-flight tasks run to completion; resumable
    Paused,
    /// Terminal: no new dispatch, not resumable
    Cancelled,
}

/// Queue, counters, and results - all behind one lock.
struct PoolQueue {
    pending: VecDeque<Task>,
    live_paths: HashSet<String>,
    total: usize,
    completed: usize,
    failed: usize,
    in_flight: usize,
    started: bool,
    closed: bool,
    results: Vec<TaskResult>,
}

impl PoolQueue {
    fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            live_paths: HashSet::new(),
            total: 0,
            completed: 0,
            failed: 0,
            in_flight: 0,
            started: false,
            closed: false,
            results: Vec::new(),
        }
    }

    fn snapshot(&self, state: PoolState) -> QueueStatus {
        QueueStatus {
            total: self.total,
            completed: self.completed,
            failed: self.failed,
            pending: self.pending.len(),
            in_flight: self.in_flight,
            is_running: self.started && state != PoolState::Cancelled,
            is_paused: state == PoolState::Paused,
        }
    }
}

/// State shared between the pool, its workers, and handles.
struct PoolShared {
    queue: Mutex<PoolQueue>,
    state_tx: watch::Sender<PoolState>,
    work_ready: Notify,
    idle: Notify,
    events_tx: mpsc::Sender<PoolEvent>,
}

impl PoolShared {
    fn state(&self) -> PoolState {
        *self.state_tx.borrow()
    }

    fn status(&self) -> QueueStatus {
        let state = self.state();
        self.queue.lock().unwrap().snapshot(state)
    }

    fn pause(&self) {
        self.state_tx.send_modify(|state| {
            if *state == PoolState::Running {
                *state = PoolState::Paused;
            }
        });
    }

    fn resume(&self) {
        self.state_tx.send_modify(|state| {
            if *state == PoolState::Paused {
                *state = PoolState::Running;
            }
        });
        self.work_ready.notify_one();
    }

    fn cancel(&self) {
        self.state_tx.send_modify(|state| *state = PoolState::Cancelled);
        self.work_ready.notify_waiters();
        self.idle.notify_waiters();
    }

    /// Retire a task: one locked mutation for all counters, then the
    /// non-blocking event publishes.
    fn complete(&self, result: TaskResult) {
        let status = {
            let mut queue = self.queue.lock().unwrap();
            queue.in_flight -= 1;
            match result.outcome {
                TaskOutcome::Completed(_) => queue.completed += 1,
                TaskOutcome::Failed { .. } => queue.failed += 1,
            }
            queue.results.push(result.clone());
            queue.snapshot(self.state())
        };

        let _ = self.events_tx.try_send(PoolEvent::TaskCompleted(result));
        let _ = self.events_tx.try_send(PoolEvent::Progress(status));
        self.idle.notify_waiters();
    }

    async fn wait_for_completion(&self) {
        let mut state_rx = self.state_tx.subscribe();
        loop {
            // Register interest before re-checking, so a completion
            // landing in between cannot be missed.
            let idle = self.idle.notified();
            {
                let queue = self.queue.lock().unwrap();
                if *state_rx.borrow() == PoolState::Cancelled {
                    return;
                }
                if queue.pending.is_empty() && queue.in_flight == 0 {
                    return;
                }
            }
            tokio::select! {
                _ = idle => {}
                _ = state_rx.changed() => {}
            }
        }
    }
}

/// Clonable control handle for a pool: pause, resume, cancel, observe.
///
/// The handle is how a host steers a run from outside - there is no
/// ambient "current pool" anywhere.
#[derive(Clone)]
pub struct PoolHandle {
    shared: Arc<PoolShared>,
}

impl PoolHandle {
    /// Stop new dispatch; in-flight tasks finish. Resumable.
    pub fn pause(&self) {
        info!("pool paused");
        self.shared.pause();
    }

    /// Continue dispatch from a paused state.
    pub fn resume(&self) {
        info!("pool resumed");
        self.shared.resume();
    }

    /// Permanently stop dispatch. In-flight tasks finish; the pool
    /// becomes terminal.
    pub fn cancel(&self) {
        info!("pool cancelled");
        self.shared.cancel();
    }

    /// Current progress snapshot.
    pub fn status(&self) -> QueueStatus {
        self.shared.status()
    }

    /// Suspend until the queue is drained or the pool is cancelled.
    pub async fn wait_for_completion(&self) {
        self.shared.wait_for_completion().await;
    }
}

/// Bounded-concurrency executor of tasks.
pub struct WorkerPool<E: TaskExecutor> {
    shared: Arc<PoolShared>,
    executor: Arc<E>,
    concurrency: usize,
    workers: Mutex<Vec<JoinHandle<()>>>,
    events_rx: Mutex<Option<mpsc::Receiver<PoolEvent>>>,
}

impl<E: TaskExecutor> WorkerPool<E> {
    /// Create a pool with the given concurrency bound and event-channel
    /// capacity. Workers are not spawned until [`start`](Self::start).
    pub fn new(executor: E, concurrency: usize, event_buffer: usize) -> Self {
        let (events_tx, events_rx) = mpsc::channel(event_buffer.max(1));
        let (state_tx, _) = watch::channel(PoolState::Running);

        Self {
            shared: Arc::new(PoolShared {
                queue: Mutex::new(PoolQueue::new()),
                state_tx,
                work_ready: Notify::new(),
                idle: Notify::new(),
                events_tx,
            }),
            executor: Arc::new(executor),
            concurrency: concurrency.max(1),
            workers: Mutex::new(Vec::new()),
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Get a control handle for this pool.
    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Take the event receiver. Returns `None` after the first call.
    pub fn take_events(&self) -> Option<mpsc::Receiver<PoolEvent>> {
        self.events_rx.lock().unwrap().take()
    }

    /// Append a task to the pending queue.
    ///
    /// Valid at any time before [`cancel`](PoolHandle::cancel) or
    /// [`close`](Self::close). At most one task per path may be live per
    /// run; a duplicate is rejected.
    pub fn enqueue(&self, task: Task) -> Result<()> {
        if self.shared.state() == PoolState::Cancelled {
            return Err(IndexError::Cancelled);
        }

        {
            let mut queue = self.shared.queue.lock().unwrap();
            if queue.closed {
                return Err(IndexError::Cancelled);
            }
            if !queue.live_paths.insert(task.path.clone()) {
                return Err(IndexError::DuplicateTask { path: task.path });
            }
            queue.total += 1;
            queue.pending.push_back(task);
        }

        self.shared.work_ready.notify_one();
        Ok(())
    }

    /// Mark the queue complete: no further enqueues. Workers exit once
    /// the queue drains instead of idling for more work.
    pub fn close(&self) {
        self.shared.queue.lock().unwrap().closed = true;
        self.shared.work_ready.notify_waiters();
    }

    /// Begin dispatch. Idempotent: calling on a running pool does
    /// nothing.
    pub fn start(&self) {
        {
            let mut queue = self.shared.queue.lock().unwrap();
            if queue.started {
                return;
            }
            queue.started = true;
        }

        debug!(concurrency = self.concurrency, "starting worker pool");
        let mut workers = self.workers.lock().unwrap();
        for worker_id in 0..self.concurrency {
            let shared = Arc::clone(&self.shared);
            let executor = Arc::clone(&self.executor);
            workers.push(tokio::spawn(worker_loop(shared, executor, worker_id)));
        }
    }

    /// Current progress snapshot.
    pub fn status(&self) -> QueueStatus {
        self.shared.status()
    }

    /// Suspend until `pending == 0` and nothing is in flight, or until
    /// the pool is cancelled.
    pub async fn wait_for_completion(&self) {
        self.shared.wait_for_completion().await;
    }

    /// Await worker exit. Meaningful after `close` + drain, or after
    /// cancel.
    pub async fn join(&self) {
        let handles: Vec<_> = self.workers.lock().unwrap().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Drain the results aggregated so far.
    pub fn take_results(&self) -> Vec<TaskResult> {
        std::mem::take(&mut self.shared.queue.lock().unwrap().results)
    }
}

impl<E: TaskExecutor> Drop for WorkerPool<E> {
    fn drop(&mut self) {
        // Orphaned workers would otherwise idle forever on an open queue.
        self.shared.cancel();
    }
}

async fn worker_loop<E: TaskExecutor>(
    shared: Arc<PoolShared>,
    executor: Arc<E>,
    worker_id: usize,
) {
    let mut state_rx = shared.state_tx.subscribe();

    loop {
        // Copy the state out so no watch read guard is held across an await.
        let state = *state_rx.borrow();
        match state {
            PoolState::Cancelled => break,
            PoolState::Paused => {
                if state_rx.changed().await.is_err() {
                    break;
                }
                continue;
            }
            PoolState::Running => {}
        }

        // Register interest before inspecting the queue, so an enqueue
        // landing in between cannot be missed.
        let ready = shared.work_ready.notified();

        let (task, drained) = {
            let mut queue = shared.queue.lock().unwrap();
            match queue.pending.pop_front() {
                Some(task) => {
                    queue.in_flight += 1;
                    let more = !queue.pending.is_empty();
                    (Some((task, more)), false)
                }
                None => (None, queue.closed),
            }
        };

        match task {
            Some((task, more_pending)) => {
                if more_pending {
                    // Chain the wakeup: a single stored permit only wakes
                    // one worker, and there is more work than that.
                    shared.work_ready.notify_one();
                }
                debug!(worker = worker_id, task = %task.id, path = %task.path, "task dispatched");
                let outcome = executor.execute(&task).await;
                let result = TaskResult {
                    task_id: task.id,
                    path: task.path,
                    outcome,
                };
                shared.complete(result);
            }
            None if drained => break,
            None => {
                tokio::select! {
                    _ = ready => {}
                    _ = state_rx.changed() => {}
                }
            }
        }
    }

    debug!(worker = worker_id, "worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::task::TaskKind;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Test executor: records execution order, tracks peak concurrency,
    /// optionally sleeps, fails paths containing "fail".
    struct RecordingExecutor {
        delay: Duration,
        order: Mutex<Vec<String>>,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl RecordingExecutor {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                order: Mutex::new(Vec::new()),
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TaskExecutor for RecordingExecutor {
        async fn execute(&self, task: &Task) -> TaskOutcome {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.order.lock().unwrap().push(task.path.clone());

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.running.fetch_sub(1, Ordering::SeqCst);

            if task.path.contains("fail") {
                TaskOutcome::Failed {
                    message: "scripted failure".into(),
                    attempts: 1,
                }
            } else {
                TaskOutcome::Completed(crate::types::record::ExtractionRecord::new(
                    &task.path,
                    "hash",
                    json!({}),
                ))
            }
        }
    }

    fn pool_with(delay_ms: u64, concurrency: usize) -> WorkerPool<RecordingExecutor> {
        WorkerPool::new(
            RecordingExecutor::new(Duration::from_millis(delay_ms)),
            concurrency,
            64,
        )
    }

    fn tasks(n: usize) -> Vec<Task> {
        (0..n)
            .map(|i| Task::new(TaskKind::Extract, format!("notes/{i}.md")))
            .collect()
    }

    #[tokio::test]
    async fn test_exactly_once_and_conservation() {
        let pool = pool_with(1, 2);
        for task in tasks(5) {
            pool.enqueue(task).unwrap();
        }
        pool.close();
        pool.start();
        pool.wait_for_completion().await;

        let status = pool.status();
        assert_eq!(status.completed + status.failed, 5);
        assert_eq!(status.pending, 0);
        assert_eq!(status.in_flight, 0);
        assert_eq!(pool.take_results().len(), 5);
    }

    #[tokio::test]
    async fn test_fifo_dispatch_with_single_worker() {
        let pool = pool_with(0, 1);
        for task in tasks(4) {
            pool.enqueue(task).unwrap();
        }
        pool.close();
        pool.start();
        pool.wait_for_completion().await;
        pool.join().await;

        let order = pool.executor.order.lock().unwrap().clone();
        assert_eq!(order, vec!["notes/0.md", "notes/1.md", "notes/2.md", "notes/3.md"]);
    }

    #[tokio::test]
    async fn test_concurrency_bound_respected() {
        let pool = pool_with(20, 2);
        for task in tasks(8) {
            pool.enqueue(task).unwrap();
        }
        pool.close();
        pool.start();
        pool.wait_for_completion().await;

        assert!(pool.executor.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_pause_before_start_then_resume() {
        let pool = pool_with(1, 3);
        let handle = pool.handle();
        for task in tasks(10) {
            pool.enqueue(task).unwrap();
        }
        pool.close();

        handle.pause();
        pool.start();

        // Paused: nothing should dispatch.
        tokio::time::sleep(Duration::from_millis(30)).await;
        let status = pool.status();
        assert_eq!(status.completed + status.failed, 0);
        assert_eq!(status.pending, 10);
        assert!(status.is_paused);

        handle.resume();
        pool.wait_for_completion().await;

        let status = pool.status();
        assert_eq!(status.completed, 10);
        assert_eq!(status.pending, 0);
    }

    #[tokio::test]
    async fn test_cancel_stops_dispatch() {
        let pool = pool_with(30, 1);
        let handle = pool.handle();
        for task in tasks(6) {
            pool.enqueue(task).unwrap();
        }
        pool.close();
        pool.start();

        // Let at least one task start, then cancel mid-run.
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();
        pool.wait_for_completion().await;
        pool.join().await;

        let status = pool.status();
        assert!(status.completed + status.failed < 6);
        assert!(status.pending > 0);
        assert!(!status.is_running);
    }

    #[tokio::test]
    async fn test_enqueue_after_cancel_rejected() {
        let pool = pool_with(0, 1);
        pool.handle().cancel();
        let err = pool.enqueue(Task::new(TaskKind::Extract, "notes/a.md")).unwrap_err();
        assert!(matches!(err, IndexError::Cancelled));
    }

    #[tokio::test]
    async fn test_duplicate_path_rejected() {
        let pool = pool_with(0, 1);
        pool.enqueue(Task::new(TaskKind::Extract, "notes/a.md")).unwrap();
        let err = pool.enqueue(Task::new(TaskKind::Reextract, "notes/a.md")).unwrap_err();
        assert!(matches!(err, IndexError::DuplicateTask { .. }));
    }

    #[tokio::test]
    async fn test_failures_do_not_poison_pool() {
        let pool = pool_with(0, 2);
        pool.enqueue(Task::new(TaskKind::Extract, "notes/fail-1.md")).unwrap();
        pool.enqueue(Task::new(TaskKind::Extract, "notes/ok.md")).unwrap();
        pool.enqueue(Task::new(TaskKind::Extract, "notes/fail-2.md")).unwrap();
        pool.close();
        pool.start();
        pool.wait_for_completion().await;

        let status = pool.status();
        assert_eq!(status.completed, 1);
        assert_eq!(status.failed, 2);
    }

    #[tokio::test]
    async fn test_events_emitted_per_completion() {
        let pool = pool_with(0, 1);
        let mut events = pool.take_events().unwrap();
        assert!(pool.take_events().is_none());

        for task in tasks(3) {
            pool.enqueue(task).unwrap();
        }
        pool.close();
        pool.start();
        pool.wait_for_completion().await;

        let mut completions = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, PoolEvent::TaskCompleted(_)) {
                completions += 1;
            }
        }
        assert_eq!(completions, 3);
    }

    #[tokio::test]
    async fn test_status_invariant_holds_mid_run() {
        let pool = pool_with(5, 2);
        for task in tasks(6) {
            pool.enqueue(task).unwrap();
        }
        pool.close();
        pool.start();

        for _ in 0..20 {
            let s = pool.status();
            assert_eq!(s.total, s.completed + s.failed + s.pending + s.in_flight);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        pool.wait_for_completion().await;
    }

    #[tokio::test]
    async fn test_start_idempotent() {
        let pool = pool_with(0, 2);
        for task in tasks(3) {
            pool.enqueue(task).unwrap();
        }
        pool.close();
        pool.start();
        pool.start();
        pool.wait_for_completion().await;

        // A second start must not spawn a second worker set.
        assert_eq!(pool.workers.lock().unwrap().len(), 2);
        assert_eq!(pool.status().completed, 3);
    }
}

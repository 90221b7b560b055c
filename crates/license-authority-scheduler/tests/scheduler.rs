// crates/license-authority-scheduler/tests/scheduler.rs
// ============================================================================
// Module: Durable Scheduler Tests
// Description: Timer, cleanup, and restart behavior of the durable scheduler.
// Purpose: Ensure persisted tasks run once and records are reclaimed.
// Dependencies: license-authority-scheduler, license-authority-core, license-authority-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! Runs the scheduler on a paused tokio clock with a [`ManualClock`] for
//! fire-time decisions. Covers timer fires, failing callbacks, malformed
//! records, re-arming, closing, and recovery after a restart against SQLite.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use license_authority_core::AuditSink;
use license_authority_core::AuthorityEvent;
use license_authority_core::BlobStore;
use license_authority_core::InMemoryBlobStore;
use license_authority_core::IssuanceEvent;
use license_authority_core::ManualClock;
use license_authority_core::NoopAuditSink;
use license_authority_core::SchedulerEvent;
use license_authority_core::StoreError;
use license_authority_scheduler::DurableScheduler;
use license_authority_scheduler::SchedulerError;
use license_authority_scheduler::SchedulerOptions;
use license_authority_scheduler::TaskCallback;
use license_authority_scheduler::TaskError;
use license_authority_store_sqlite::SqliteBlobStore;
use license_authority_store_sqlite::SqliteStoreConfig;
use tempfile::TempDir;
use time::Duration;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Callback that records payloads and optionally fails.
#[derive(Default)]
struct Recorder {
    /// Payloads seen, in call order.
    calls: Mutex<Vec<Vec<u8>>>,
    /// Whether every call returns an error.
    fail: bool,
}

impl Recorder {
    fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn calls(&self) -> Vec<Vec<u8>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskCallback for Recorder {
    async fn run(&self, payload: &[u8]) -> Result<(), TaskError> {
        self.calls.lock().unwrap().push(payload.to_vec());
        if self.fail { Err(TaskError::new("callback refused")) } else { Ok(()) }
    }
}

/// Audit sink that keeps scheduler actions.
#[derive(Default)]
struct ActionLog {
    /// Recorded action labels.
    actions: Mutex<Vec<&'static str>>,
}

impl ActionLog {
    fn contains(&self, action: &str) -> bool {
        self.actions.lock().unwrap().iter().any(|recorded| *recorded == action)
    }
}

impl AuditSink for ActionLog {
    fn record_authority(&self, _event: &AuthorityEvent) {}

    fn record_issuance(&self, _event: &IssuanceEvent) {}

    fn record_scheduler(&self, event: &SchedulerEvent) {
        self.actions.lock().unwrap().push(event.action);
    }
}

/// Store whose deletes fail for one path.
struct StuckDeleteStore {
    /// Backing store.
    inner: InMemoryBlobStore,
    /// Path that cannot be deleted.
    stuck: &'static str,
}

impl BlobStore for StuckDeleteStore {
    fn exists(&self, path: &str) -> Result<bool, StoreError> {
        self.inner.exists(path)
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.read(path)
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.inner.write(path, bytes)
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        if path == self.stuck {
            return Err(StoreError::Io("delete refused".to_string()));
        }
        self.inner.delete(path)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.list(prefix)
    }
}

fn start_time() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
}

fn memory_scheduler(
    store: &InMemoryBlobStore,
    clock: &ManualClock,
    audit: Arc<dyn AuditSink>,
) -> DurableScheduler {
    DurableScheduler::new(
        Arc::new(store.clone()),
        Arc::new(clock.clone()),
        SchedulerOptions::default(),
        audit,
    )
    .unwrap()
}

fn sqlite_store(dir: &TempDir) -> SqliteBlobStore {
    SqliteBlobStore::new(&SqliteStoreConfig::new(dir.path().join("scheduler.sqlite"))).unwrap()
}

fn records(store: &dyn BlobStore) -> Vec<String> {
    store.list("scheduler/tasks/").unwrap()
}

/// Yields on the paused clock until `condition` holds.
async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0 .. 1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(StdDuration::from_millis(100)).await;
    }
    panic!("condition not reached");
}

// ============================================================================
// SECTION: Timer Fires
// ============================================================================

#[tokio::test(start_paused = true)]
async fn timer_fire_runs_callback_and_deletes_record() {
    let store = InMemoryBlobStore::new();
    let clock = ManualClock::new(start_time());
    let scheduler = memory_scheduler(&store, &clock, Arc::new(NoopAuditSink));
    let recorder = Arc::new(Recorder::default());

    let id = scheduler
        .schedule(start_time() + Duration::seconds(1), recorder.clone(), b"revoke")
        .unwrap();
    assert_eq!(records(&store), vec![format!("scheduler/tasks/{id}")]);
    assert_eq!(scheduler.pending_timers(), 1);

    wait_until(|| scheduler.pending_timers() == 0).await;
    assert_eq!(recorder.calls(), vec![b"revoke".to_vec()]);
    assert!(records(&store).is_empty());
}

#[tokio::test(start_paused = true)]
async fn past_fire_time_runs_immediately() {
    let store = InMemoryBlobStore::new();
    let clock = ManualClock::new(start_time());
    let scheduler = memory_scheduler(&store, &clock, Arc::new(NoopAuditSink));
    let recorder = Arc::new(Recorder::default());

    scheduler.schedule(start_time() - Duration::hours(1), recorder.clone(), b"late").unwrap();
    wait_until(|| recorder.calls().len() == 1).await;
    wait_until(|| records(&store).is_empty()).await;
}

#[tokio::test(start_paused = true)]
async fn failing_callback_still_deletes_record() {
    let store = InMemoryBlobStore::new();
    let clock = ManualClock::new(start_time());
    let audit = Arc::new(ActionLog::default());
    let scheduler = memory_scheduler(&store, &clock, audit.clone());
    let recorder = Arc::new(Recorder::failing());

    scheduler.schedule(start_time() + Duration::seconds(1), recorder.clone(), b"x").unwrap();
    wait_until(|| scheduler.pending_timers() == 0).await;

    assert_eq!(recorder.calls().len(), 1);
    assert!(records(&store).is_empty());
    assert!(audit.contains("callback_failed"));
}

#[tokio::test(start_paused = true)]
async fn payload_may_contain_separator_bytes() {
    let store = InMemoryBlobStore::new();
    let clock = ManualClock::new(start_time());
    let scheduler = memory_scheduler(&store, &clock, Arc::new(NoopAuditSink));
    let recorder = Arc::new(Recorder::default());

    scheduler.schedule(start_time(), recorder.clone(), b"a|b|\x00c").unwrap();
    wait_until(|| recorder.calls().len() == 1).await;
    assert_eq!(recorder.calls()[0], b"a|b|\x00c".to_vec());
}

// ============================================================================
// SECTION: Cleanup
// ============================================================================

#[tokio::test(start_paused = true)]
async fn cleanup_deletes_malformed_records_without_callback() {
    let store = InMemoryBlobStore::new();
    store.write("scheduler/tasks/garbage", b"not a record").unwrap();
    store.write("scheduler/tasks/bad-time", b"yesterday|payload").unwrap();
    let clock = ManualClock::new(start_time());
    let audit = Arc::new(ActionLog::default());
    let scheduler = memory_scheduler(&store, &clock, audit.clone());
    let recorder = Arc::new(Recorder::default());

    let report = scheduler.cleanup(recorder.clone()).await.unwrap();
    assert_eq!(report.malformed, 2);
    assert_eq!(report.executed, 0);
    assert!(recorder.calls().is_empty());
    assert!(records(&store).is_empty());
    assert!(audit.contains("malformed_deleted"));
}

#[tokio::test(start_paused = true)]
async fn failed_malformed_delete_does_not_abort_cleanup() {
    let inner = InMemoryBlobStore::new();
    inner.write("scheduler/tasks/a-garbage", b"not a record").unwrap();
    inner.write("scheduler/tasks/b-due", b"2023-11-14T22:00:00Z|due").unwrap();
    let store = Arc::new(StuckDeleteStore {
        inner: inner.clone(),
        stuck: "scheduler/tasks/a-garbage",
    });
    let clock = ManualClock::new(start_time());
    let audit = Arc::new(ActionLog::default());
    let scheduler = DurableScheduler::new(
        store,
        Arc::new(clock.clone()),
        SchedulerOptions::default(),
        audit.clone(),
    )
    .unwrap();
    let recorder = Arc::new(Recorder::default());

    let report = scheduler.cleanup(recorder.clone()).await.unwrap();
    assert_eq!(report.malformed, 0);
    assert_eq!(report.executed, 1);
    assert_eq!(recorder.calls(), vec![b"due".to_vec()]);
    assert!(audit.contains("delete_failed"));
    assert_eq!(records(&inner), vec!["scheduler/tasks/a-garbage".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn cleanup_skips_tasks_with_live_timers() {
    let store = InMemoryBlobStore::new();
    let clock = ManualClock::new(start_time());
    let scheduler = memory_scheduler(&store, &clock, Arc::new(NoopAuditSink));
    let recorder = Arc::new(Recorder::default());

    scheduler.schedule(start_time() + Duration::hours(1), recorder.clone(), b"later").unwrap();
    let report = scheduler.cleanup(recorder.clone()).await.unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.rearmed, 0);
    assert_eq!(scheduler.pending_timers(), 1);
    assert!(recorder.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cleanup_rearms_untracked_future_records() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start_time());
    let recorder = Arc::new(Recorder::default());

    let first = DurableScheduler::new(
        Arc::new(sqlite_store(&dir)),
        Arc::new(clock.clone()),
        SchedulerOptions::default(),
        Arc::new(NoopAuditSink),
    )
    .unwrap();
    first.schedule(start_time() + Duration::seconds(30), recorder.clone(), b"future").unwrap();
    first.close().unwrap();

    let store = Arc::new(sqlite_store(&dir));
    let second = DurableScheduler::new(
        store.clone(),
        Arc::new(clock.clone()),
        SchedulerOptions::default(),
        Arc::new(NoopAuditSink),
    )
    .unwrap();
    let report = second.cleanup(recorder.clone()).await.unwrap();
    assert_eq!(report.rearmed, 1);
    assert_eq!(second.pending_timers(), 1);
    assert!(recorder.calls().is_empty());

    wait_until(|| second.pending_timers() == 0).await;
    assert_eq!(recorder.calls(), vec![b"future".to_vec()]);
    assert!(records(store.as_ref()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn restart_runs_overdue_task_exactly_once() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start_time());
    let recorder = Arc::new(Recorder::default());

    let first = DurableScheduler::new(
        Arc::new(sqlite_store(&dir)),
        Arc::new(clock.clone()),
        SchedulerOptions::default(),
        Arc::new(NoopAuditSink),
    )
    .unwrap();
    first.schedule(start_time() + Duration::seconds(2), recorder.clone(), b"exam-window").unwrap();
    first.close().unwrap();
    assert!(recorder.calls().is_empty());

    clock.advance(Duration::seconds(3));
    let store = Arc::new(sqlite_store(&dir));
    let second = DurableScheduler::new(
        store.clone(),
        Arc::new(clock.clone()),
        SchedulerOptions::default(),
        Arc::new(NoopAuditSink),
    )
    .unwrap();

    let report = second.cleanup(recorder.clone()).await.unwrap();
    assert_eq!(report.executed, 1);
    assert_eq!(recorder.calls(), vec![b"exam-window".to_vec()]);
    assert!(records(store.as_ref()).is_empty());

    let again = second.cleanup(recorder.clone()).await.unwrap();
    assert_eq!(again.executed, 0);
    assert_eq!(recorder.calls().len(), 1);
    second.close().unwrap();
}

#[tokio::test(start_paused = true)]
async fn periodic_cleanup_reaps_overdue_records() {
    let store = InMemoryBlobStore::new();
    store.write("scheduler/tasks/orphan", b"2023-11-14T22:13:19Z|orphan").unwrap();
    let clock = ManualClock::new(start_time());
    let scheduler = memory_scheduler(&store, &clock, Arc::new(NoopAuditSink));
    let recorder = Arc::new(Recorder::default());

    let handle =
        scheduler.start_periodic_cleanup(StdDuration::from_secs(5), recorder.clone()).unwrap();
    wait_until(|| recorder.calls().len() == 1).await;
    assert!(records(&store).is_empty());

    scheduler.close().unwrap();
    assert!(handle.await.unwrap_err().is_cancelled());
}

// ============================================================================
// SECTION: Close and Validation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn schedule_after_close_fails_and_keeps_records() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(start_time());
    let scheduler = DurableScheduler::new(
        Arc::new(sqlite_store(&dir)),
        Arc::new(clock.clone()),
        SchedulerOptions::default(),
        Arc::new(NoopAuditSink),
    )
    .unwrap();
    let recorder = Arc::new(Recorder::default());

    scheduler.schedule(start_time() + Duration::seconds(1), recorder.clone(), b"kept").unwrap();
    scheduler.close().unwrap();
    scheduler.close().unwrap();
    assert_eq!(scheduler.pending_timers(), 0);

    let result = scheduler.schedule(start_time(), recorder.clone(), b"late");
    assert_eq!(result, Err(SchedulerError::Closed));
    assert!(matches!(scheduler.cleanup(recorder.clone()).await, Err(SchedulerError::Closed)));

    tokio::time::sleep(StdDuration::from_secs(5)).await;
    assert!(recorder.calls().is_empty());
    assert_eq!(records(&sqlite_store(&dir)).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn oversized_payload_is_rejected_without_write() {
    let store = InMemoryBlobStore::new();
    let clock = ManualClock::new(start_time());
    let scheduler = DurableScheduler::new(
        Arc::new(store.clone()),
        Arc::new(clock),
        SchedulerOptions {
            max_payload_bytes: 4,
            ..SchedulerOptions::default()
        },
        Arc::new(NoopAuditSink),
    )
    .unwrap();

    let result = scheduler.schedule(start_time(), Arc::new(Recorder::default()), b"too long");
    assert!(matches!(result, Err(SchedulerError::Invalid(_))));
    assert!(store.is_empty().unwrap());
}

#[test]
fn new_requires_a_tokio_runtime() {
    let result = DurableScheduler::new(
        Arc::new(InMemoryBlobStore::new()),
        Arc::new(ManualClock::new(start_time())),
        SchedulerOptions::default(),
        Arc::new(NoopAuditSink),
    );
    assert!(matches!(result, Err(SchedulerError::Runtime(_))));
}

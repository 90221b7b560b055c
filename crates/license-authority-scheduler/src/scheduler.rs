// crates/license-authority-scheduler/src/scheduler.rs
// ============================================================================
// Module: Durable Scheduler
// Description: Persisted one-shot tasks with in-memory tokio timers.
// Purpose: Fire deferred callbacks and recover them across restarts.
// Dependencies: license-authority-core, async-trait, tokio, uuid
// ============================================================================

//! ## Overview
//! [`DurableScheduler::schedule`] writes the task record and only then arms a
//! timer. When the timer fires the callback runs with no scheduler lock held,
//! the record is deleted whether the callback succeeded or not, and the task
//! is untracked. Callback failures go to the audit sink and are not retried.
//!
//! [`DurableScheduler::cleanup`] reconciles the store with the in-memory
//! timers:
//!
//! | Record | Tracked | Action |
//! |---|---|---|
//! | malformed | any | delete, audit |
//! | overdue | no | claim, run callback, delete |
//! | overdue | yes | leave to its timer |
//! | future | no | re-arm |
//! | future | yes | leave |
//!
//! Invariants:
//! - A record exists from `schedule` returning `Ok` until its callback has
//!   returned (fire or cleanup).
//! - At most one in-process execution per task id at a time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use license_authority_core::AuditSink;
use license_authority_core::BlobStore;
use license_authority_core::Clock;
use license_authority_core::SchedulerEvent;
use license_authority_core::StoreError;
use license_authority_core::TaskId;
use license_authority_core::core::paths::validate_component;
use license_authority_core::core::paths::validate_path;
use license_authority_core::core::time::format_rfc3339;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::pool::BufferPool;
use crate::record::TaskRecord;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default store prefix for task records.
pub const DEFAULT_TASK_PREFIX: &str = "scheduler/tasks";
/// Default maximum payload size in bytes.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 64 * 1024;
/// Default number of idle record buffers kept.
pub const DEFAULT_POOL_SIZE: usize = 16;
/// Default capacity of record buffers.
pub const DEFAULT_BUFFER_CAPACITY: usize = 256;
/// Attempts made to find an unused task id.
const MAX_ID_ATTEMPTS: usize = 8;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Scheduler errors returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Blob store failure.
    #[error("scheduler store error: {0}")]
    Store(String),
    /// Scheduler has been closed.
    #[error("scheduler closed")]
    Closed,
    /// Input or options are invalid.
    #[error("invalid scheduler input: {0}")]
    Invalid(String),
    /// No tokio runtime is available.
    #[error("scheduler runtime unavailable: {0}")]
    Runtime(String),
}

impl From<StoreError> for SchedulerError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Closed => Self::Closed,
            other => Self::Store(other.to_string()),
        }
    }
}

/// Error reported by a task callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TaskError {
    /// Failure description.
    message: String,
}

impl TaskError {
    /// Creates a callback error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the failure description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

// ============================================================================
// SECTION: Callback
// ============================================================================

/// Action executed when a task fires.
#[async_trait]
pub trait TaskCallback: Send + Sync {
    /// Runs the task with its persisted payload.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError`] on failure; the task is still removed.
    async fn run(&self, payload: &[u8]) -> Result<(), TaskError>;
}

// ============================================================================
// SECTION: Options and Reports
// ============================================================================

/// Scheduler options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Store prefix holding task records.
    pub prefix: String,
    /// Maximum payload size in bytes.
    pub max_payload_bytes: usize,
    /// Number of idle record buffers kept.
    pub pool_size: usize,
    /// Capacity of record buffers.
    pub buffer_capacity: usize,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_TASK_PREFIX.to_string(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            pool_size: DEFAULT_POOL_SIZE,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// Counts produced by one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Overdue tasks executed by this pass.
    pub executed: usize,
    /// Executed tasks whose callback failed.
    pub failed: usize,
    /// Future tasks re-armed with a timer.
    pub rearmed: usize,
    /// Malformed records deleted.
    pub malformed: usize,
    /// Records left to an existing timer or execution.
    pub skipped: usize,
}

// ============================================================================
// SECTION: Scheduler
// ============================================================================

/// In-memory state for a tracked task.
enum TaskSlot {
    /// Timer armed for the task.
    Timer(AbortHandle),
    /// Task claimed by a cleanup pass.
    Claimed,
}

/// State shared between the scheduler handle and its timers.
struct SchedulerInner {
    /// Durable record store.
    store: Arc<dyn BlobStore>,
    /// Time source for fire-time decisions.
    clock: Arc<dyn Clock>,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
    /// Store prefix without trailing slash.
    prefix: String,
    /// Maximum payload size in bytes.
    max_payload_bytes: usize,
    /// Record formatting buffers.
    pool: BufferPool,
    /// Tracked tasks.
    tasks: Mutex<HashMap<TaskId, TaskSlot>>,
    /// Periodic cleanup loop, when started.
    cleanup_task: Mutex<Option<AbortHandle>>,
    /// Set once closed.
    closed: AtomicBool,
    /// Runtime used to spawn timers.
    runtime: Handle,
}

/// Durable one-shot task scheduler.
#[derive(Clone)]
pub struct DurableScheduler {
    /// Shared scheduler state.
    inner: Arc<SchedulerInner>,
}

impl DurableScheduler {
    /// Creates a scheduler bound to the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Runtime`] outside a tokio runtime and
    /// [`SchedulerError::Invalid`] for an unsafe prefix.
    pub fn new(
        store: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        options: SchedulerOptions,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, SchedulerError> {
        let runtime = Handle::try_current().map_err(|err| SchedulerError::Runtime(err.to_string()))?;
        let prefix = options.prefix.trim_end_matches('/').to_string();
        validate_path(&prefix).map_err(|err| SchedulerError::Invalid(err.to_string()))?;
        if options.max_payload_bytes == 0 {
            return Err(SchedulerError::Invalid(
                "max_payload_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            inner: Arc::new(SchedulerInner {
                store,
                clock,
                audit,
                prefix,
                max_payload_bytes: options.max_payload_bytes,
                pool: BufferPool::new(options.pool_size, options.buffer_capacity),
                tasks: Mutex::new(HashMap::new()),
                cleanup_task: Mutex::new(None),
                closed: AtomicBool::new(false),
                runtime,
            }),
        })
    }

    /// Persists a task and arms its timer.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] when the scheduler is closed, the payload is
    /// too large, or the record cannot be written. On error the task is not
    /// scheduled.
    pub fn schedule(
        &self,
        fire_at: OffsetDateTime,
        callback: Arc<dyn TaskCallback>,
        payload: &[u8],
    ) -> Result<TaskId, SchedulerError> {
        let inner = &self.inner;
        if inner.is_closed() {
            return Err(SchedulerError::Closed);
        }
        if payload.len() > inner.max_payload_bytes {
            return Err(SchedulerError::Invalid(format!(
                "payload exceeds {} bytes",
                inner.max_payload_bytes
            )));
        }
        let id = inner.next_id()?;
        let path = inner.record_path(&id)?;
        {
            let mut buffer = inner.pool.checkout();
            TaskRecord::encode_into(&mut buffer, fire_at, payload);
            inner.store.write(&path, &buffer)?;
        }
        {
            let mut tasks = inner.lock_tasks()?;
            if !inner.is_closed() {
                inner.arm_locked(&mut tasks, id.clone(), fire_at, payload.to_vec(), callback);
            }
        }
        inner.audit.record_scheduler(
            &SchedulerEvent::new("scheduled", Some(id.to_string()))
                .with_fire_at(format_rfc3339(fire_at)),
        );
        Ok(id)
    }

    /// Reconciles persisted records with in-memory timers.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] when the scheduler is closed or the store
    /// cannot be listed. Per-record failures are audited and skipped.
    pub async fn cleanup(
        &self,
        callback: Arc<dyn TaskCallback>,
    ) -> Result<CleanupReport, SchedulerError> {
        self.inner.cleanup(callback).await
    }

    /// Starts a background loop running [`Self::cleanup`] every `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] when closed or `interval` is zero.
    pub fn start_periodic_cleanup(
        &self,
        interval: std::time::Duration,
        callback: Arc<dyn TaskCallback>,
    ) -> Result<JoinHandle<()>, SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::Invalid("cleanup interval must be non-zero".to_string()));
        }
        if self.inner.is_closed() {
            return Err(SchedulerError::Closed);
        }
        let inner = Arc::clone(&self.inner);
        let handle = self.inner.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if inner.is_closed() {
                    break;
                }
                if let Err(err) = inner.cleanup(Arc::clone(&callback)).await {
                    inner.audit.record_scheduler(
                        &SchedulerEvent::new("cleanup_failed", None).with_message(err.to_string()),
                    );
                }
            }
        });
        let mut slot = self
            .inner
            .cleanup_task
            .lock()
            .map_err(|_| SchedulerError::Store("cleanup task mutex poisoned".to_string()))?;
        if let Some(previous) = slot.replace(handle.abort_handle()) {
            previous.abort();
        }
        drop(slot);
        Ok(handle)
    }

    /// Returns the number of armed in-memory timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner.tasks.lock().map_or(0, |tasks| {
            tasks.values().filter(|slot| matches!(slot, TaskSlot::Timer(_))).count()
        })
    }

    /// Stops all timers and the cleanup loop, then closes the store.
    ///
    /// Persisted records are kept for the next process. Closing twice is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Store`] when the store fails to close.
    pub fn close(&self) -> Result<(), SchedulerError> {
        let inner = &self.inner;
        if inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Ok(mut slot) = inner.cleanup_task.lock()
            && let Some(handle) = slot.take()
        {
            handle.abort();
        }
        let timers: Vec<TaskSlot> = match inner.tasks.lock() {
            Ok(mut tasks) => tasks.drain().map(|(_, slot)| slot).collect(),
            Err(_) => Vec::new(),
        };
        for slot in timers {
            if let TaskSlot::Timer(handle) = slot {
                handle.abort();
            }
        }
        inner.audit.record_scheduler(&SchedulerEvent::new("closed", None));
        inner.store.close().map_err(|err| SchedulerError::Store(err.to_string()))
    }
}

impl SchedulerInner {
    /// Returns true once the scheduler is closed.
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Locks the task table.
    fn lock_tasks(&self) -> Result<MutexGuard<'_, HashMap<TaskId, TaskSlot>>, SchedulerError> {
        self.tasks.lock().map_err(|_| SchedulerError::Store("task table mutex poisoned".to_string()))
    }

    /// Returns the record path for a task.
    fn record_path(&self, id: &TaskId) -> Result<String, SchedulerError> {
        validate_component("task id", id.as_str())
            .map_err(|err| SchedulerError::Invalid(err.to_string()))?;
        Ok(format!("{}/{}", self.prefix, id.as_str()))
    }

    /// Generates a task id unused in memory and in the store.
    fn next_id(&self) -> Result<TaskId, SchedulerError> {
        for _ in 0 .. MAX_ID_ATTEMPTS {
            let id = TaskId::new(Uuid::now_v7().to_string());
            let tracked = self.lock_tasks()?.contains_key(&id);
            if !tracked && !self.store.exists(&self.record_path(&id)?)? {
                return Ok(id);
            }
        }
        Err(SchedulerError::Invalid("could not allocate a unique task id".to_string()))
    }

    /// Arms a timer for a task while the task table is locked.
    fn arm_locked(
        self: &Arc<Self>,
        tasks: &mut HashMap<TaskId, TaskSlot>,
        id: TaskId,
        fire_at: OffsetDateTime,
        payload: Vec<u8>,
        callback: Arc<dyn TaskCallback>,
    ) {
        let delay = std::time::Duration::try_from(fire_at - self.clock.now()).unwrap_or_default();
        let inner = Arc::clone(self);
        let task_id = id.clone();
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            inner.execute(&task_id, fire_at, &payload, callback.as_ref(), "fired").await;
        });
        if let Some(TaskSlot::Timer(previous)) = tasks.insert(id, TaskSlot::Timer(handle.abort_handle())) {
            previous.abort();
        }
    }

    /// Runs a callback, deletes the record, then untracks the task.
    ///
    /// Returns true when the callback succeeded.
    async fn execute(
        &self,
        id: &TaskId,
        fire_at: OffsetDateTime,
        payload: &[u8],
        callback: &dyn TaskCallback,
        action: &'static str,
    ) -> bool {
        let outcome = callback.run(payload).await;
        let succeeded = outcome.is_ok();
        let event = match outcome {
            Ok(()) => SchedulerEvent::new(action, Some(id.to_string())),
            Err(err) => SchedulerEvent::new("callback_failed", Some(id.to_string()))
                .with_message(err.to_string()),
        };
        self.audit.record_scheduler(&event.with_fire_at(format_rfc3339(fire_at)));
        match self.record_path(id) {
            Ok(path) => {
                if let Err(err) = self.store.delete(&path) {
                    self.audit.record_scheduler(
                        &SchedulerEvent::new("delete_failed", Some(id.to_string()))
                            .with_message(err.to_string()),
                    );
                }
            }
            Err(err) => {
                self.audit.record_scheduler(
                    &SchedulerEvent::new("delete_failed", Some(id.to_string()))
                        .with_message(err.to_string()),
                );
            }
        }
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.remove(id);
        }
        succeeded
    }

    /// Reconciles persisted records with in-memory state.
    async fn cleanup(
        self: &Arc<Self>,
        callback: Arc<dyn TaskCallback>,
    ) -> Result<CleanupReport, SchedulerError> {
        if self.is_closed() {
            return Err(SchedulerError::Closed);
        }
        let list_prefix = format!("{}/", self.prefix);
        let paths = self.store.list(&list_prefix)?;
        let mut report = CleanupReport::default();
        for path in paths {
            let Some(raw_id) = path.strip_prefix(&list_prefix) else {
                continue;
            };
            if raw_id.is_empty() || raw_id.contains('/') {
                continue;
            }
            let id = TaskId::new(raw_id);
            let bytes = match self.store.read(&path) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(err) => {
                    self.audit.record_scheduler(
                        &SchedulerEvent::new("read_failed", Some(id.to_string()))
                            .with_message(err.to_string()),
                    );
                    continue;
                }
            };
            let record = match TaskRecord::decode(&bytes) {
                Ok(record) => record,
                Err(err) => {
                    if !self.lock_tasks()?.contains_key(&id) {
                        if let Err(delete_err) = self.store.delete(&path) {
                            self.audit.record_scheduler(
                                &SchedulerEvent::new("delete_failed", Some(id.to_string()))
                                    .with_message(delete_err.to_string()),
                            );
                            continue;
                        }
                        report.malformed += 1;
                        self.audit.record_scheduler(
                            &SchedulerEvent::new("malformed_deleted", Some(id.to_string()))
                                .with_message(err.to_string()),
                        );
                    }
                    continue;
                }
            };
            let overdue = record.fire_at <= self.clock.now();
            {
                let mut tasks = self.lock_tasks()?;
                if tasks.contains_key(&id) {
                    report.skipped += 1;
                    continue;
                }
                if overdue {
                    tasks.insert(id.clone(), TaskSlot::Claimed);
                } else {
                    self.arm_locked(
                        &mut tasks,
                        id.clone(),
                        record.fire_at,
                        record.payload.clone(),
                        Arc::clone(&callback),
                    );
                    report.rearmed += 1;
                    drop(tasks);
                    self.audit.record_scheduler(
                        &SchedulerEvent::new("rearmed", Some(id.to_string()))
                            .with_fire_at(format_rfc3339(record.fire_at)),
                    );
                    continue;
                }
            }
            report.executed += 1;
            if !self
                .execute(&id, record.fire_at, &record.payload, callback.as_ref(), "reaped")
                .await
            {
                report.failed += 1;
            }
        }
        Ok(report)
    }
}

// crates/license-authority-scheduler/src/lib.rs
// ============================================================================
// Module: License Authority Scheduler
// Description: Durable one-shot task scheduler with crash recovery.
// Purpose: Run deferred actions exactly once per fire on a single node.
// Dependencies: license-authority-core, tokio, uuid
// ============================================================================

//! ## Overview
//! [`DurableScheduler`] persists each task as `<rfc3339 fire time>|<payload>`
//! under a store prefix before arming an in-memory tokio timer. The store is
//! the source of truth and timers are a cache: after a restart,
//! [`DurableScheduler::cleanup`] runs overdue tasks, re-arms future ones, and
//! discards malformed records.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod pool;
pub mod record;
pub mod scheduler;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use pool::BufferPool;
pub use pool::PooledBuffer;
pub use record::RecordError;
pub use record::TaskRecord;
pub use scheduler::CleanupReport;
pub use scheduler::DurableScheduler;
pub use scheduler::SchedulerError;
pub use scheduler::SchedulerOptions;
pub use scheduler::TaskCallback;
pub use scheduler::TaskError;

// crates/license-authority-core/src/runtime/audit.rs
// ============================================================================
// Module: License Authority Audit Logging
// Description: Structured audit events for authority, issuance, and scheduling.
// Purpose: Emit JSON-line audit records without a logging framework dependency.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events are serialized as one JSON object per line. Sinks write to
//! stderr, an append-only file, or nowhere. Events never carry key material or
//! certificate bodies; certificates are referenced by SHA-256 only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;

use crate::core::time::unix_millis;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Certificate authority audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorityEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Action label (`ca_created`, `ca_loaded`).
    pub action: &'static str,
    /// Issuer namespace.
    pub issuer: String,
    /// Hex SHA-256 of the CA certificate PEM.
    pub certificate_sha256: String,
}

impl AuthorityEvent {
    /// Creates an authority event stamped with the current time.
    #[must_use]
    pub fn new(action: &'static str, issuer: String, certificate_sha256: String) -> Self {
        Self {
            event: "authority",
            timestamp_ms: unix_millis(),
            action,
            issuer,
            certificate_sha256,
        }
    }
}

/// License issuance audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct IssuanceEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Requester domain, when it could be derived.
    pub domain: Option<String>,
    /// Requested product.
    pub product: String,
    /// Requested cluster.
    pub cluster: String,
    /// Issuance channel label.
    pub channel: &'static str,
    /// Outcome label (`signed`, `reused`, `rejected`, `failed`).
    pub outcome: &'static str,
    /// Rejection or failure reason.
    pub reason: Option<String>,
    /// Credential expiry (RFC 3339), when issued.
    pub not_after: Option<String>,
    /// Hex SHA-256 of the delivered certificate PEM.
    pub certificate_sha256: Option<String>,
}

/// Inputs required to construct an issuance event.
pub struct IssuanceEventParams {
    /// Requester domain, when it could be derived.
    pub domain: Option<String>,
    /// Requested product.
    pub product: String,
    /// Requested cluster.
    pub cluster: String,
    /// Issuance channel label.
    pub channel: &'static str,
    /// Outcome label.
    pub outcome: &'static str,
    /// Rejection or failure reason.
    pub reason: Option<String>,
    /// Credential expiry (RFC 3339), when issued.
    pub not_after: Option<String>,
    /// Hex SHA-256 of the delivered certificate PEM.
    pub certificate_sha256: Option<String>,
}

impl IssuanceEvent {
    /// Creates an issuance event stamped with the current time.
    #[must_use]
    pub fn new(params: IssuanceEventParams) -> Self {
        Self {
            event: "issuance",
            timestamp_ms: unix_millis(),
            domain: params.domain,
            product: params.product,
            cluster: params.cluster,
            channel: params.channel,
            outcome: params.outcome,
            reason: params.reason,
            not_after: params.not_after,
            certificate_sha256: params.certificate_sha256,
        }
    }
}

/// Scheduler audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Action label (`scheduled`, `fired`, `callback_failed`, ...).
    pub action: &'static str,
    /// Task identifier, when known.
    pub task_id: Option<String>,
    /// Task fire time (RFC 3339), when known.
    pub fire_at: Option<String>,
    /// Free-form detail (error text, counts).
    pub message: Option<String>,
}

impl SchedulerEvent {
    /// Creates a scheduler event stamped with the current time.
    #[must_use]
    pub fn new(action: &'static str, task_id: Option<String>) -> Self {
        Self {
            event: "scheduler",
            timestamp_ms: unix_millis(),
            action,
            task_id,
            fire_at: None,
            message: None,
        }
    }

    /// Attaches the task fire time.
    #[must_use]
    pub fn with_fire_at(mut self, fire_at: String) -> Self {
        self.fire_at = Some(fire_at);
        self
    }

    /// Attaches a detail message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for license authority events.
pub trait AuditSink: Send + Sync {
    /// Records a certificate authority event.
    fn record_authority(&self, event: &AuthorityEvent);

    /// Records an issuance event.
    fn record_issuance(&self, event: &IssuanceEvent);

    /// Records a scheduler event.
    fn record_scheduler(&self, event: &SchedulerEvent);
}

/// Writes one serialized event per line to `writer`.
fn write_line(writer: &mut impl Write, event: &impl Serialize) {
    if let Ok(payload) = serde_json::to_string(event) {
        let _ = writeln!(writer, "{payload}");
        let _ = writer.flush();
    }
}

/// Audit sink that logs JSON lines to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record_authority(&self, event: &AuthorityEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_issuance(&self, event: &IssuanceEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_scheduler(&self, event: &SchedulerEvent) {
        write_line(&mut io::stderr(), event);
    }
}

/// Audit sink that appends JSON lines to a file.
#[derive(Debug)]
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends a serialized event under the file lock.
    fn append(&self, event: &impl Serialize) {
        if let Ok(mut file) = self.file.lock() {
            write_line(&mut *file, event);
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record_authority(&self, event: &AuthorityEvent) {
        self.append(event);
    }

    fn record_issuance(&self, event: &IssuanceEvent) {
        self.append(event);
    }

    fn record_scheduler(&self, event: &SchedulerEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_authority(&self, _event: &AuthorityEvent) {}

    fn record_issuance(&self, _event: &IssuanceEvent) {}

    fn record_scheduler(&self, _event: &SchedulerEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    //! Audit sink serialization tests.
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions.")]

    use super::*;

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audit.log");
        let sink = FileAuditSink::new(&path).expect("sink");
        sink.record_scheduler(
            &SchedulerEvent::new("fired", Some("task-1".to_string())).with_message("ok"),
        );
        sink.record_authority(&AuthorityEvent::new(
            "ca_loaded",
            "default".to_string(),
            "00".to_string(),
        ));
        let contents = std::fs::read_to_string(&path).expect("read");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).expect("json");
        assert_eq!(first["event"], "scheduler");
        assert_eq!(first["action"], "fired");
        assert_eq!(first["task_id"], "task-1");
        let second: serde_json::Value = serde_json::from_str(lines[1]).expect("json");
        assert_eq!(second["event"], "authority");
    }
}

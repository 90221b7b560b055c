// crates/license-authority-core/src/core/time.rs
// ============================================================================
// Module: License Authority Time Model
// Description: Clock abstraction and canonical timestamp helpers.
// Purpose: Keep issuance and scheduling decisions testable against injected time.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Components never read wall-clock time directly; they receive a [`Clock`]
//! at construction. [`SystemClock`] is used in production and
//! [`ManualClock`] drives deterministic tests. All timestamps are UTC and
//! rendered as RFC 3339 for storage paths and persisted records.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use time::Duration;
use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current instant in UTC.
    fn now(&self) -> OffsetDateTime;
}

/// Clock backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manually advanced clock for tests and replays.
///
/// # Invariants
/// - Clones share the same underlying instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    /// Current instant guarded by a mutex.
    now: Arc<Mutex<OffsetDateTime>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start.to_offset(UtcOffset::UTC))),
        }
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += delta;
        }
    }

    /// Sets the clock to `instant`.
    pub fn set(&self, instant: OffsetDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = instant.to_offset(UtcOffset::UTC);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        self.now.lock().map_or_else(|_| OffsetDateTime::now_utc(), |guard| *guard)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Normalizes an instant to UTC and drops sub-second precision.
#[must_use]
pub fn truncate_to_seconds(instant: OffsetDateTime) -> OffsetDateTime {
    let utc = instant.to_offset(UtcOffset::UTC);
    OffsetDateTime::from_unix_timestamp(utc.unix_timestamp()).unwrap_or(utc)
}

/// Formats an instant as RFC 3339 in UTC.
///
/// Falls back to the unix timestamp when the instant cannot be represented
/// (years outside 0..=9999).
#[must_use]
pub fn format_rfc3339(instant: OffsetDateTime) -> String {
    let utc = instant.to_offset(UtcOffset::UTC);
    utc.format(&Rfc3339).unwrap_or_else(|_| utc.unix_timestamp().to_string())
}

/// Parses an RFC 3339 timestamp and normalizes it to UTC.
///
/// # Errors
///
/// Returns a parse error when the value is not valid RFC 3339.
pub fn parse_rfc3339(value: &str) -> Result<OffsetDateTime, time::error::Parse> {
    OffsetDateTime::parse(value, &Rfc3339).map(|instant| instant.to_offset(UtcOffset::UTC))
}

/// Returns the current unix epoch in milliseconds.
#[must_use]
pub fn unix_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    //! Clock and timestamp helper tests.
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions.")]

    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let start = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("timestamp");
        let clock = ManualClock::new(start);
        let other = clock.clone();
        clock.advance(Duration::seconds(5));
        assert_eq!(other.now(), start + Duration::seconds(5));
    }

    #[test]
    fn truncate_drops_subseconds() {
        let base = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("timestamp");
        let instant = base + Duration::milliseconds(750);
        assert_eq!(truncate_to_seconds(instant), base);
    }

    #[test]
    fn rfc3339_round_trip_is_utc() {
        let instant = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("timestamp");
        let text = format_rfc3339(instant);
        assert_eq!(text, "2023-11-14T22:13:20Z");
        assert_eq!(parse_rfc3339(&text).expect("parse"), instant);
        assert!(parse_rfc3339("not-a-time").is_err());
    }
}

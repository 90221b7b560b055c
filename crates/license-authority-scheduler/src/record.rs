// crates/license-authority-scheduler/src/record.rs
// ============================================================================
// Module: Scheduler Record Codec
// Description: Encode and decode persisted task records.
// Purpose: Keep the on-store task format in one place.
// Dependencies: license-authority-core, time
// ============================================================================

//! ## Overview
//! A record is the RFC 3339 fire time, a `|` separator, then the raw payload
//! bytes. The payload may itself contain `|`; only the first separator splits.

use license_authority_core::core::time::format_rfc3339;
use license_authority_core::core::time::parse_rfc3339;
use thiserror::Error;
use time::OffsetDateTime;

/// Separator between the fire time and the payload.
pub const RECORD_SEPARATOR: u8 = b'|';

/// Record decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// No `|` separator present.
    #[error("task record missing separator")]
    MissingSeparator,
    /// Fire time is not valid RFC 3339.
    #[error("task record has invalid fire time: {0}")]
    InvalidTimestamp(String),
}

/// Decoded task record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    /// Scheduled fire time (UTC).
    pub fire_at: OffsetDateTime,
    /// Opaque payload.
    pub payload: Vec<u8>,
}

impl TaskRecord {
    /// Appends the encoded record for `fire_at` and `payload` to `out`.
    pub fn encode_into(out: &mut Vec<u8>, fire_at: OffsetDateTime, payload: &[u8]) {
        out.extend_from_slice(format_rfc3339(fire_at).as_bytes());
        out.push(RECORD_SEPARATOR);
        out.extend_from_slice(payload);
    }

    /// Decodes a persisted record.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when the separator is missing or the fire time
    /// does not parse.
    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        let split = bytes
            .iter()
            .position(|byte| *byte == RECORD_SEPARATOR)
            .ok_or(RecordError::MissingSeparator)?;
        let (head, rest) = bytes.split_at(split);
        let head = std::str::from_utf8(head)
            .map_err(|_| RecordError::InvalidTimestamp("fire time is not utf-8".to_string()))?;
        let fire_at =
            parse_rfc3339(head).map_err(|err| RecordError::InvalidTimestamp(err.to_string()))?;
        Ok(Self {
            fire_at,
            payload: rest[1 ..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    //! Record codec tests.
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions.")]

    use super::*;

    #[test]
    fn payload_may_contain_separator() {
        let fire_at = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("timestamp");
        let mut out = Vec::new();
        TaskRecord::encode_into(&mut out, fire_at, b"revoke|grant-7");
        assert_eq!(out, b"2023-11-14T22:13:20Z|revoke|grant-7");
        let record = TaskRecord::decode(&out).expect("decode");
        assert_eq!(record.fire_at, fire_at);
        assert_eq!(record.payload, b"revoke|grant-7");
    }

    #[test]
    fn malformed_records_are_rejected() {
        assert_eq!(TaskRecord::decode(b"no separator"), Err(RecordError::MissingSeparator));
        assert!(matches!(TaskRecord::decode(b"yesterday|x"), Err(RecordError::InvalidTimestamp(_))));
        assert!(matches!(TaskRecord::decode(b"|x"), Err(RecordError::InvalidTimestamp(_))));
    }

    #[test]
    fn empty_payload_is_allowed() {
        let record = TaskRecord::decode(b"2023-11-14T22:13:20Z|").expect("decode");
        assert!(record.payload.is_empty());
    }
}

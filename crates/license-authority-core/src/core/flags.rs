// crates/license-authority-core/src/core/flags.rs
// ============================================================================
// Module: Feature Flags
// Description: Feature-flag sets embedded in license certificates.
// Purpose: Encode flags into the locality attribute and compare them as sets.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Feature flags are `key=value` pairs. Each entry becomes its own locality
//! attribute in a license certificate; [`FeatureFlags::entries`] yields them
//! in key order and [`FeatureFlags::from_entries`] accepts them in any order,
//! so comparisons are always set equality over the decoded map. The joined
//! form (`,` between entries) is used for display and command-line input.
//!
//! Invariants:
//! - Keys are non-empty and contain neither `=` nor `,`.
//! - Values contain no `,`.
//! - A key appears at most once.
//! - The joined form never exceeds [`MAX_ENCODED_FLAGS_LENGTH`] bytes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Separator between flag entries in the encoded form.
const ENTRY_SEPARATOR: char = ',';
/// Separator between a flag key and its value.
const KEY_VALUE_SEPARATOR: char = '=';
/// Maximum number of flags accepted on a single license.
pub const MAX_FLAGS: usize = 64;
/// Maximum encoded length of the flag set.
pub const MAX_ENCODED_FLAGS_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Feature-flag validation and decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagError {
    /// Flag key is empty or contains a reserved separator.
    #[error("invalid feature flag key: {0:?}")]
    InvalidKey(String),
    /// Flag value contains a reserved separator.
    #[error("invalid feature flag value for {key}: {value:?}")]
    InvalidValue {
        /// Flag key.
        key: String,
        /// Offending value.
        value: String,
    },
    /// Encoded entry is missing the `=` separator.
    #[error("malformed feature flag entry: {0:?}")]
    MalformedEntry(String),
    /// Key appears more than once in an encoded set.
    #[error("duplicate feature flag: {0}")]
    Duplicate(String),
    /// Flag set exceeds size limits.
    #[error("feature flags exceed limits: {0}")]
    TooLarge(String),
}

// ============================================================================
// SECTION: Feature Flags
// ============================================================================

/// Validated set of feature flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureFlags(BTreeMap<String, String>);

impl FeatureFlags {
    /// Creates an empty flag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a validated flag set from key/value pairs.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError`] when a key or value is invalid, a key repeats, or
    /// the set exceeds [`MAX_FLAGS`] or [`MAX_ENCODED_FLAGS_LENGTH`].
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self, FlagError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut flags = Self::new();
        for (key, value) in pairs {
            let key = key.into();
            if flags.0.contains_key(&key) {
                return Err(FlagError::Duplicate(key));
            }
            flags.insert(key, value)?;
        }
        Ok(flags)
    }

    /// Inserts a flag, replacing an existing value for the key.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError`] when the key or value is invalid, the set is full,
    /// or the joined form would exceed [`MAX_ENCODED_FLAGS_LENGTH`].
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), FlagError> {
        let key = key.into();
        let value = value.into();
        validate_key(&key)?;
        if value.contains(ENTRY_SEPARATOR) || value.chars().any(char::is_control) {
            return Err(FlagError::InvalidValue {
                key,
                value,
            });
        }
        let replaced = self.0.get(&key).map(|old| entry_len(&key, old));
        if replaced.is_none() && self.0.len() >= MAX_FLAGS {
            return Err(FlagError::TooLarge(format!("more than {MAX_FLAGS} flags")));
        }
        let count = if replaced.is_some() { self.0.len() } else { self.0.len() + 1 };
        let projected = self.entries_len() - replaced.unwrap_or(0) + entry_len(&key, &value)
            + (count - 1);
        if projected > MAX_ENCODED_FLAGS_LENGTH {
            return Err(FlagError::TooLarge(format!(
                "encoded flags exceed {MAX_ENCODED_FLAGS_LENGTH} bytes"
            )));
        }
        self.0.insert(key, value);
        Ok(())
    }

    /// Builds a flag set from individual `key=value` entries in any order.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError`] when an entry lacks `=`, a key repeats, or the
    /// set exceeds its limits.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a str>) -> Result<Self, FlagError> {
        let mut pairs = Vec::new();
        for entry in entries {
            let Some((key, value)) = entry.split_once(KEY_VALUE_SEPARATOR) else {
                return Err(FlagError::MalformedEntry(entry.to_string()));
            };
            pairs.push((key.to_string(), value.to_string()));
        }
        Self::from_pairs(pairs)
    }

    /// Returns the value of a flag.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns the number of flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no flag is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates flags in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Returns the `key=value` entries in key order, one per locality attribute.
    pub fn entries(&self) -> impl Iterator<Item = String> + '_ {
        self.0.iter().map(|(key, value)| format!("{key}{KEY_VALUE_SEPARATOR}{value}"))
    }

    /// Returns the byte length of [`Self::encode`].
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.entries_len() + self.0.len().saturating_sub(1)
    }

    /// Sums the lengths of all entries, excluding separators.
    fn entries_len(&self) -> usize {
        self.0.iter().map(|(key, value)| entry_len(key, value)).sum()
    }

    /// Encodes the flags into the canonical joined string.
    #[must_use]
    pub fn encode(&self) -> String {
        self.entries().collect::<Vec<_>>().join(&ENTRY_SEPARATOR.to_string())
    }

    /// Decodes a joined string in any entry order.
    ///
    /// Empty entries (for example from a trailing separator) are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError`] when an entry is malformed or a key repeats.
    pub fn decode(encoded: &str) -> Result<Self, FlagError> {
        if encoded.len() > MAX_ENCODED_FLAGS_LENGTH {
            return Err(FlagError::TooLarge(format!(
                "encoded flags exceed {MAX_ENCODED_FLAGS_LENGTH} bytes"
            )));
        }
        Self::from_entries(encoded.split(ENTRY_SEPARATOR).filter(|entry| !entry.is_empty()))
    }

    /// Parses a single `key=value` argument.
    ///
    /// # Errors
    ///
    /// Returns [`FlagError::MalformedEntry`] when `=` is missing.
    pub fn parse_assignment(raw: &str) -> Result<(String, String), FlagError> {
        raw.split_once(KEY_VALUE_SEPARATOR)
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .ok_or_else(|| FlagError::MalformedEntry(raw.to_string()))
    }
}

impl fmt::Display for FeatureFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Returns the length of one `key=value` entry.
const fn entry_len(key: &str, value: &str) -> usize {
    key.len() + 1 + value.len()
}

/// Validates a flag key.
fn validate_key(key: &str) -> Result<(), FlagError> {
    if key.is_empty()
        || key.contains(KEY_VALUE_SEPARATOR)
        || key.contains(ENTRY_SEPARATOR)
        || key.chars().any(|ch| ch.is_control() || ch.is_whitespace())
    {
        return Err(FlagError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

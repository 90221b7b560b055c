// crates/license-authority-core/src/core/identifiers.rs
// ============================================================================
// Module: License Authority Identifiers
// Description: Canonical opaque identifiers for products, clusters, domains, and tasks.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the string-based identifiers used throughout the
//! license authority. Identifiers serialize as plain strings. Storage-path
//! safety is enforced by [`crate::core::paths`], while request-level
//! validation happens in the issuance engine.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Product identifier resolved through the product registry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Cluster (or instance) identifier a credential is bound to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(String);

impl ClusterId {
    /// Creates a new cluster identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the identifier is usable as a DNS name.
    ///
    /// Accepts dot-separated labels of ASCII alphanumerics and hyphens, each
    /// label 1..=63 bytes and not starting or ending with a hyphen.
    #[must_use]
    pub fn is_dns_safe(&self) -> bool {
        let value = self.0.as_str();
        if value.is_empty() || value.len() > 253 {
            return false;
        }
        value.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'-')
        })
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ClusterId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Lower-cased email domain owning licenses.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    /// Creates a domain, normalizing it to lower case.
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self(domain.into().to_ascii_lowercase())
    }

    /// Returns the domain as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when this domain equals `other` or is a subdomain of it.
    #[must_use]
    pub fn is_within(&self, other: &str) -> bool {
        let other = other.trim().trim_start_matches('.').to_ascii_lowercase();
        if other.is_empty() {
            return false;
        }
        self.0 == other || self.0.ends_with(&format!(".{other}"))
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Requester email address.
///
/// # Invariants
/// - Exactly one `@` separating a non-empty local part and a dotted domain.
/// - Stored lower-cased and trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Parses and normalizes an email address.
    ///
    /// Returns `None` when the value is not a plausible address.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let value = raw.trim().to_ascii_lowercase();
        let (local, domain) = value.split_once('@')?;
        if local.is_empty() || domain.contains('@') || !domain.contains('.') {
            return None;
        }
        if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
            return None;
        }
        if value.chars().any(|ch| ch.is_whitespace() || ch.is_control() || !ch.is_ascii()) {
            return None;
        }
        if value.contains('/') || value.contains('\\') {
            return None;
        }
        Some(Self(value))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the domain part of the address.
    #[must_use]
    pub fn domain(&self) -> Domain {
        let domain = self.0.rsplit_once('@').map_or("", |(_, domain)| domain);
        Domain::new(domain)
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Issuer namespace selecting a certificate authority.
///
/// The empty namespace selects the default issuer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssuerName(String);

impl IssuerName {
    /// Creates a new issuer namespace.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the default (empty) issuer namespace.
    #[must_use]
    pub fn default_issuer() -> Self {
        Self(String::new())
    }

    /// Returns the namespace as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the default issuer.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for IssuerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() { f.write_str("default") } else { self.0.fmt(f) }
    }
}

/// Scheduled task identifier.
///
/// Identifiers are generated as time-ordered values so lexical order of the
/// persisted keys follows creation order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Creates a new task identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    //! Identifier normalization tests.
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions.")]

    use super::*;

    #[test]
    fn email_parse_normalizes_and_derives_domain() {
        let email = EmailAddress::parse("  Alice@Example.COM ").expect("valid email");
        assert_eq!(email.as_str(), "alice@example.com");
        assert_eq!(email.domain().as_str(), "example.com");
    }

    #[test]
    fn email_parse_rejects_malformed_values() {
        for raw in ["", "no-at-sign", "@example.com", "a@b@c.com", "a@nodot", "a b@x.com", "a@x..com"]
        {
            assert!(EmailAddress::parse(raw).is_none(), "{raw} should be rejected");
        }
    }

    #[test]
    fn domain_within_matches_subdomains_only() {
        let domain = Domain::new("mail.tempbox.io");
        assert!(domain.is_within("tempbox.io"));
        assert!(domain.is_within(".tempbox.io"));
        assert!(!domain.is_within("box.io"));
        assert!(!Domain::new("nottempbox.io").is_within("tempbox.io"));
    }

    #[test]
    fn cluster_dns_safety() {
        assert!(ClusterId::new("prod-01.eu.example").is_dns_safe());
        assert!(!ClusterId::new("").is_dns_safe());
        assert!(!ClusterId::new("-bad").is_dns_safe());
        assert!(!ClusterId::new("has/slash").is_dns_safe());
        assert!(!ClusterId::new("a..b").is_dns_safe());
    }
}

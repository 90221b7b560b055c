// crates/license-authority-core/src/core/license.rs
// ============================================================================
// Module: License Records
// Description: License requests, product licenses, and access-log entries.
// Purpose: Define the records exchanged with and persisted by the issuance engine.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! A [`LicenseRequest`] asks for a credential for one
//! `(domain, product, cluster)` triple. The owning [`ProductLicense`] decides
//! how long credentials may live: a fixed TTL for community products, or an
//! agreement with an explicit expiry for enterprise products. Every delivered
//! credential produces an [`AccessLogEntry`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::Duration;
use time::OffsetDateTime;

use crate::core::flags::FeatureFlags;
use crate::core::identifiers::ClusterId;
use crate::core::identifiers::Domain;
use crate::core::identifiers::ProductId;

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Channel a license request arrived through.
///
/// # Invariants
/// - Only [`IssuanceChannel::Direct`] requests write full-license logs and
///   verified-email markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssuanceChannel {
    /// Full issuance requested directly by the account holder.
    Direct,
    /// Token-gated self-service issuance.
    SelfService {
        /// Token identifier that authorized the request.
        token_id: String,
    },
}

impl IssuanceChannel {
    /// Returns a stable label for the channel.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::SelfService {
                ..
            } => "self_service",
        }
    }
}

/// Request for a signed license credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseRequest {
    /// Subject display name.
    pub name: String,
    /// Subject email address (raw, validated by the engine).
    pub email: String,
    /// Requested product.
    pub product: ProductId,
    /// Cluster the credential is bound to.
    pub cluster: ClusterId,
    /// Requested validity extension from now.
    pub extension: Duration,
    /// Feature flags embedded into the credential.
    pub flags: FeatureFlags,
    /// Channel the request arrived through.
    pub channel: IssuanceChannel,
}

// ============================================================================
// SECTION: Product License
// ============================================================================

/// Validity term of a product license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LicenseTerm {
    /// Fixed lifetime applied from each issuance.
    Ttl {
        /// Lifetime in seconds.
        seconds: i64,
    },
    /// Agreement with an explicit expiry.
    Agreement {
        /// Agreement expiry (UTC, whole seconds).
        #[serde(with = "time::serde::rfc3339")]
        expires_at: OffsetDateTime,
        /// Optional cluster-count limit.
        #[serde(default)]
        max_clusters: Option<u32>,
    },
}

/// License covering one `(domain, product)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLicense {
    /// Owning email domain.
    pub domain: Domain,
    /// Licensed product.
    pub product: ProductId,
    /// Validity term.
    pub term: LicenseTerm,
}

impl ProductLicense {
    /// Returns the latest allowed credential expiry when issuing at `now`.
    #[must_use]
    pub fn expiry_at(&self, now: OffsetDateTime) -> OffsetDateTime {
        match &self.term {
            LicenseTerm::Ttl {
                seconds,
            } => now + Duration::seconds(*seconds),
            LicenseTerm::Agreement {
                expires_at,
                ..
            } => *expires_at,
        }
    }

    /// Returns the cluster limit, when the term carries one.
    #[must_use]
    pub const fn max_clusters(&self) -> Option<u32> {
        match &self.term {
            LicenseTerm::Ttl {
                ..
            } => None,
            LicenseTerm::Agreement {
                max_clusters,
                ..
            } => *max_clusters,
        }
    }
}

// ============================================================================
// SECTION: Access Log
// ============================================================================

/// Outcome of an issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuanceOutcome {
    /// A fresh credential was signed.
    Signed,
    /// An existing credential was reused unchanged.
    Reused,
}

impl IssuanceOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Signed => "signed",
            Self::Reused => "reused",
        }
    }
}

/// Access-log entry persisted for delivered credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    /// Subject display name.
    pub name: String,
    /// Subject email address.
    pub email: String,
    /// Owning domain.
    pub domain: Domain,
    /// Licensed product.
    pub product: ProductId,
    /// Cluster identifier.
    pub cluster: ClusterId,
    /// Issuance channel.
    pub channel: IssuanceChannel,
    /// Whether the credential was signed or reused.
    pub outcome: IssuanceOutcome,
    /// Event time (UTC).
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Authoritative credential expiry (UTC).
    #[serde(with = "time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
    /// Hex-encoded SHA-256 of the certificate PEM.
    pub certificate_sha256: String,
}

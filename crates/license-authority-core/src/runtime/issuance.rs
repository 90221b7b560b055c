// crates/license-authority-core/src/runtime/issuance.rs
// ============================================================================
// Module: License Issuance Engine
// Description: Reuse-or-sign policy for per-cluster license credentials.
// Purpose: Validate requests, apply agreements, sign, persist, and log.
// Dependencies: crate::{core, interfaces}, crate::runtime::{authority, certificate, audit}
// ============================================================================

//! ## Overview
//! [`LicenseIssuer::issue`] turns a [`LicenseRequest`] into a signed
//! credential for one `(domain, product, cluster)` triple.
//!
//! Validation (unknown product, malformed or disposable email, banned email,
//! bad cluster or extension) completes before any write. Every enterprise
//! request targets `now + extension` (whole seconds, UTC) and records it in
//! the stored agreement, which only ever moves later and carries its cluster
//! limit over. Community products use a
//! [`LicenseTerm::Ttl`] term built from the product TTL. Targets never exceed
//! the root certificate's expiry.
//!
//! A stored enterprise credential is reused unchanged when it expires no
//! earlier than the target and carries exactly the requested flags; otherwise
//! a fresh key and certificate are signed and written (certificate first,
//! then key). Community products always sign.
//!
//! Requests for the same `(domain, product)` are serialized by an in-process
//! lock, which covers agreement creation, the cluster limit, and the
//! per-cluster read-then-write.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use thiserror::Error;
use time::Duration;
use time::OffsetDateTime;

use crate::core::email::EmailPolicy;
use crate::core::identifiers::EmailAddress;
use crate::core::license::AccessLogEntry;
use crate::core::license::IssuanceChannel;
use crate::core::license::IssuanceOutcome;
use crate::core::license::LicenseRequest;
use crate::core::license::LicenseTerm;
use crate::core::license::ProductLicense;
use crate::core::paths::LicensePaths;
use crate::core::paths::email_banned;
use crate::core::paths::email_verified;
use crate::core::products::ProductDefinition;
use crate::core::products::ProductRegistry;
use crate::core::products::ProductTier;
use crate::core::time::Clock;
use crate::core::time::format_rfc3339;
use crate::core::time::truncate_to_seconds;
use crate::interfaces::BlobStore;
use crate::interfaces::StoreError;
use crate::runtime::audit::AuditSink;
use crate::runtime::audit::IssuanceEvent;
use crate::runtime::audit::IssuanceEventParams;
use crate::runtime::authority::AuthorityError;
use crate::runtime::authority::CertificateAuthority;
use crate::runtime::certificate::CredentialFields;
use crate::runtime::certificate::ParseResult;
use crate::runtime::certificate::parse_credential;
use crate::runtime::certificate::sha256_hex;
use crate::runtime::certificate::sign_credential;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum validity extension in days.
pub const DEFAULT_MAX_EXTENSION_DAYS: i64 = 3650;
/// File suffix identifying issued certificates under the clusters prefix.
const CERTIFICATE_SUFFIX: &str = "/tls.crt";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// License issuance errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IssuanceError {
    /// Product is not in the registry.
    #[error("unknown product: {0}")]
    UnknownProduct(String),
    /// Request fields are malformed.
    #[error("invalid license request: {0}")]
    InvalidRequest(String),
    /// Requester uses a disposable email provider.
    #[error("disposable email domain rejected: {0}")]
    DisposableEmail(String),
    /// Requester email is banned.
    #[error("banned email rejected: {0}")]
    BannedEmail(String),
    /// Agreement cluster limit reached.
    #[error("cluster limit of {limit} reached for {key}")]
    ClusterLimitExceeded {
        /// `domain/product/cluster` key.
        key: String,
        /// Configured limit.
        limit: u32,
    },
    /// Blob store failure.
    #[error("license store error for {key}: {message}")]
    Store {
        /// `domain/product/cluster` key.
        key: String,
        /// Underlying error text.
        message: String,
    },
    /// Key generation or signing failure.
    #[error("license crypto error for {key}: {message}")]
    Crypto {
        /// `domain/product/cluster` key.
        key: String,
        /// Underlying error text.
        message: String,
    },
}

impl IssuanceError {
    /// Returns a stable label for audit records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownProduct(_) => "unknown_product",
            Self::InvalidRequest(_) => "invalid_request",
            Self::DisposableEmail(_) => "disposable_email",
            Self::BannedEmail(_) => "banned_email",
            Self::ClusterLimitExceeded {
                ..
            } => "cluster_limit_exceeded",
            Self::Store {
                ..
            } => "store",
            Self::Crypto {
                ..
            } => "crypto",
        }
    }

    /// Returns true for rejections raised before any state mutation.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Self::Store {
                ..
            } | Self::Crypto {
                ..
            }
        )
    }
}

/// Returns a mapper attaching the request key to store errors.
fn store_error(key: &str) -> impl Fn(StoreError) -> IssuanceError + '_ {
    move |error| IssuanceError::Store {
        key: key.to_string(),
        message: error.to_string(),
    }
}

/// Returns a mapper attaching the request key to authority errors.
fn authority_error(key: &str) -> impl Fn(AuthorityError) -> IssuanceError + '_ {
    move |error| match error {
        AuthorityError::Store(message) => IssuanceError::Store {
            key: key.to_string(),
            message,
        },
        other => IssuanceError::Crypto {
            key: key.to_string(),
            message: other.to_string(),
        },
    }
}

// ============================================================================
// SECTION: Options and Results
// ============================================================================

/// Issuance policy options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerOptions {
    /// Largest accepted validity extension.
    pub max_extension: Duration,
    /// Disposable-domain denylist.
    pub email_policy: EmailPolicy,
}

impl Default for IssuerOptions {
    fn default() -> Self {
        Self {
            max_extension: Duration::days(DEFAULT_MAX_EXTENSION_DAYS),
            email_policy: EmailPolicy::default(),
        }
    }
}

/// Delivered license credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedLicense {
    /// Certificate PEM.
    pub certificate_pem: String,
    /// Private key PEM.
    pub private_key_pem: String,
    /// Authoritative credential expiry.
    pub not_after: OffsetDateTime,
    /// Whether the credential was signed or reused.
    pub outcome: IssuanceOutcome,
    /// Access-log entry persisted for this delivery.
    pub log_entry: AccessLogEntry,
}

// ============================================================================
// SECTION: Keyed Locks
// ============================================================================

/// In-process mutexes keyed by string.
#[derive(Debug, Default)]
struct KeyedLocks {
    /// Lock table; entries without outside holders are pruned on access.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    /// Returns the lock for `key`, creating it when needed.
    fn entry(&self, key: &str) -> Result<Arc<Mutex<()>>, String> {
        let mut table = self.locks.lock().map_err(|_| "issuance lock table poisoned".to_string())?;
        table.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(Arc::clone(table.entry(key.to_string()).or_default()))
    }
}

// ============================================================================
// SECTION: Issuer
// ============================================================================

/// Validated view of a request.
struct Validated<'a> {
    /// Product definition.
    product: &'a ProductDefinition,
    /// Normalized requester email.
    email: EmailAddress,
    /// Path builder for the license.
    paths: LicensePaths,
}

/// License issuance engine.
pub struct LicenseIssuer {
    /// Durable blob store.
    store: Arc<dyn BlobStore>,
    /// Signing authority.
    authority: Arc<CertificateAuthority>,
    /// Known products.
    registry: ProductRegistry,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
    /// Policy options.
    options: IssuerOptions,
    /// Per-license locks.
    locks: KeyedLocks,
}

impl LicenseIssuer {
    /// Creates an issuance engine.
    #[must_use]
    pub fn new(
        store: Arc<dyn BlobStore>,
        authority: Arc<CertificateAuthority>,
        registry: ProductRegistry,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
        options: IssuerOptions,
    ) -> Self {
        Self {
            store,
            authority,
            registry,
            clock,
            audit,
            options,
            locks: KeyedLocks::default(),
        }
    }

    /// Returns the product registry.
    #[must_use]
    pub const fn registry(&self) -> &ProductRegistry {
        &self.registry
    }

    /// Issues (or reuses) a credential for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`IssuanceError`] for rejected requests (no state is written)
    /// and for storage or signing failures. A failure after the certificate
    /// write still returns an error; the license is not delivered.
    pub fn issue(&self, request: &LicenseRequest) -> Result<IssuedLicense, IssuanceError> {
        let result = self.issue_inner(request);
        let domain = EmailAddress::parse(&request.email).map(|email| email.domain().to_string());
        let params = match &result {
            Ok(issued) => IssuanceEventParams {
                domain,
                product: request.product.to_string(),
                cluster: request.cluster.to_string(),
                channel: request.channel.as_str(),
                outcome: issued.outcome.as_str(),
                reason: None,
                not_after: Some(format_rfc3339(issued.not_after)),
                certificate_sha256: Some(issued.log_entry.certificate_sha256.clone()),
            },
            Err(error) => IssuanceEventParams {
                domain,
                product: request.product.to_string(),
                cluster: request.cluster.to_string(),
                channel: request.channel.as_str(),
                outcome: if error.is_rejection() { "rejected" } else { "failed" },
                reason: Some(error.kind().to_string()),
                not_after: None,
                certificate_sha256: None,
            },
        };
        self.audit.record_issuance(&IssuanceEvent::new(params));
        result
    }

    /// Runs the issuance algorithm without audit bookkeeping.
    fn issue_inner(&self, request: &LicenseRequest) -> Result<IssuedLicense, IssuanceError> {
        let validated = self.validate(request)?;
        let key = format!(
            "{}/{}/{}",
            validated.email.domain(),
            validated.product.id,
            request.cluster
        );
        let lock = self
            .locks
            .entry(&format!("{}/{}", validated.email.domain(), validated.product.id))
            .map_err(|message| IssuanceError::Store {
                key: key.clone(),
                message,
            })?;
        let _guard = lock.lock().map_err(|_| IssuanceError::Store {
            key: key.clone(),
            message: "issuance lock poisoned".to_string(),
        })?;

        let now = truncate_to_seconds(self.clock.now());
        let license = match validated.product.tier {
            ProductTier::Community => ProductLicense {
                domain: validated.email.domain(),
                product: validated.product.id.clone(),
                term: LicenseTerm::Ttl {
                    seconds: Duration::days(i64::from(validated.product.community_ttl_days))
                        .whole_seconds(),
                },
            },
            ProductTier::Enterprise => self.record_agreement(&validated, request, now, &key)?,
        };
        let target = license.expiry_at(now).min(self.authority.not_after());
        let max_clusters = license.max_clusters();

        let cert_path = validated.paths.certificate(&request.cluster).map_err(store_error(&key))?;
        let key_path = validated.paths.private_key(&request.cluster).map_err(store_error(&key))?;

        if validated.product.tier == ProductTier::Enterprise {
            let certificate = self.store.read(&cert_path).map_err(store_error(&key))?;
            let private_key = self.store.read(&key_path).map_err(store_error(&key))?;
            if let ParseResult::Valid(stored) =
                parse_credential(certificate.as_deref(), private_key.as_deref())
                && stored.not_after >= target
                && stored.flags == request.flags
            {
                let log_entry = self.write_log(
                    &validated,
                    request,
                    IssuanceOutcome::Reused,
                    stored.not_after,
                    &stored.certificate_pem,
                    &key,
                )?;
                return Ok(IssuedLicense {
                    certificate_pem: stored.certificate_pem,
                    private_key_pem: stored.private_key_pem,
                    not_after: stored.not_after,
                    outcome: IssuanceOutcome::Reused,
                    log_entry,
                });
            }
        }

        if let Some(limit) = max_clusters {
            self.enforce_cluster_limit(&validated, request, limit, &key)?;
        }

        let signed = sign_credential(
            &self.authority,
            &CredentialFields {
                cluster: &request.cluster,
                product: validated.product,
                email: &validated.email,
                flags: &request.flags,
                not_before: now,
                not_after: target,
            },
        )
        .map_err(authority_error(&key))?;
        self.store
            .write(&cert_path, signed.certificate_pem.as_bytes())
            .map_err(store_error(&key))?;
        self.store
            .write(&key_path, signed.private_key_pem.as_bytes())
            .map_err(store_error(&key))?;

        let log_entry = self.write_log(
            &validated,
            request,
            IssuanceOutcome::Signed,
            target,
            &signed.certificate_pem,
            &key,
        )?;
        Ok(IssuedLicense {
            certificate_pem: signed.certificate_pem,
            private_key_pem: signed.private_key_pem,
            not_after: target,
            outcome: IssuanceOutcome::Signed,
            log_entry,
        })
    }

    /// Validates a request without touching storage beyond the banned marker.
    fn validate<'a>(&'a self, request: &LicenseRequest) -> Result<Validated<'a>, IssuanceError> {
        let product = self
            .registry
            .get(&request.product)
            .ok_or_else(|| IssuanceError::UnknownProduct(request.product.to_string()))?;
        if !request.cluster.is_dns_safe() {
            return Err(IssuanceError::InvalidRequest(format!(
                "cluster is not a dns name: {}",
                request.cluster
            )));
        }
        if request.extension <= Duration::ZERO {
            return Err(IssuanceError::InvalidRequest("extension must be positive".to_string()));
        }
        if request.extension > self.options.max_extension {
            return Err(IssuanceError::InvalidRequest(format!(
                "extension exceeds maximum of {} days",
                self.options.max_extension.whole_days()
            )));
        }
        if let IssuanceChannel::SelfService {
            token_id,
        } = &request.channel
            && token_id.trim().is_empty()
        {
            return Err(IssuanceError::InvalidRequest(
                "self-service token id must be non-empty".to_string(),
            ));
        }
        let email = EmailAddress::parse(&request.email).ok_or_else(|| {
            IssuanceError::InvalidRequest(format!("malformed email: {}", request.email))
        })?;
        let domain = email.domain();
        if self.options.email_policy.is_disposable(&domain) {
            return Err(IssuanceError::DisposableEmail(domain.to_string()));
        }
        let key = format!("{domain}/{}/{}", product.id, request.cluster);
        let banned = email_banned(&email).map_err(store_error(&key))?;
        if self.store.exists(&banned).map_err(store_error(&key))? {
            return Err(IssuanceError::BannedEmail(email.to_string()));
        }
        let paths = LicensePaths::new(&domain, &product.id).map_err(|error| {
            IssuanceError::InvalidRequest(error.to_string())
        })?;
        // Cluster path validity is checked before any write.
        paths.cluster_dir(&request.cluster).map_err(|error| {
            IssuanceError::InvalidRequest(error.to_string())
        })?;
        Ok(Validated {
            product,
            email,
            paths,
        })
    }

    /// Records the agreement for this request and returns the license that
    /// governs it.
    ///
    /// The returned expiry is always `now + extension`. The persisted
    /// agreement keeps the later of that and its stored expiry, so it never
    /// ends before a credential issued under it, and keeps its cluster limit.
    fn record_agreement(
        &self,
        validated: &Validated<'_>,
        request: &LicenseRequest,
        now: OffsetDateTime,
        key: &str,
    ) -> Result<ProductLicense, IssuanceError> {
        let path = validated.paths.agreement();
        let domain = validated.email.domain();
        let stored = self
            .store
            .read(&path)
            .map_err(store_error(key))?
            .and_then(|bytes| serde_json::from_slice::<ProductLicense>(&bytes).ok())
            .filter(|license| {
                license.domain == domain
                    && license.product == validated.product.id
                    && matches!(license.term, LicenseTerm::Agreement { .. })
            });
        let requested = truncate_to_seconds(now + request.extension);
        let (expires_at, max_clusters) = match &stored {
            Some(license) => (license.expiry_at(now).max(requested), license.max_clusters()),
            None => (requested, validated.product.max_clusters),
        };
        let agreement = ProductLicense {
            domain,
            product: validated.product.id.clone(),
            term: LicenseTerm::Agreement {
                expires_at,
                max_clusters,
            },
        };
        let license = ProductLicense {
            term: LicenseTerm::Agreement {
                expires_at: requested,
                max_clusters,
            },
            ..agreement.clone()
        };
        if stored.as_ref() == Some(&agreement) {
            return Ok(license);
        }
        let bytes = serde_json::to_vec_pretty(&agreement).map_err(|error| IssuanceError::Store {
            key: key.to_string(),
            message: error.to_string(),
        })?;
        self.store.write(&path, &bytes).map_err(store_error(key))?;
        Ok(license)
    }

    /// Rejects a new cluster once the agreement's cluster limit is reached.
    fn enforce_cluster_limit(
        &self,
        validated: &Validated<'_>,
        request: &LicenseRequest,
        limit: u32,
        key: &str,
    ) -> Result<(), IssuanceError> {
        let prefix = validated.paths.clusters_prefix();
        let clusters: BTreeSet<_> = self
            .store
            .list(&prefix)
            .map_err(store_error(key))?
            .iter()
            .filter(|path| path.ends_with(CERTIFICATE_SUFFIX))
            .filter_map(|path| validated.paths.cluster_of(path))
            .collect();
        let limit_usize = usize::try_from(limit).unwrap_or(usize::MAX);
        if !clusters.contains(&request.cluster) && clusters.len() >= limit_usize {
            return Err(IssuanceError::ClusterLimitExceeded {
                key: key.to_string(),
                limit,
            });
        }
        Ok(())
    }

    /// Persists the access-log entry for the request channel.
    fn write_log(
        &self,
        validated: &Validated<'_>,
        request: &LicenseRequest,
        outcome: IssuanceOutcome,
        not_after: OffsetDateTime,
        certificate_pem: &str,
        key: &str,
    ) -> Result<AccessLogEntry, IssuanceError> {
        let timestamp = self.clock.now();
        let entry = AccessLogEntry {
            name: request.name.clone(),
            email: validated.email.to_string(),
            domain: validated.email.domain(),
            product: validated.product.id.clone(),
            cluster: request.cluster.clone(),
            channel: request.channel.clone(),
            outcome,
            timestamp,
            not_after,
            certificate_sha256: sha256_hex(certificate_pem.as_bytes()),
        };
        let bytes = serde_json::to_vec_pretty(&entry).map_err(|error| IssuanceError::Store {
            key: key.to_string(),
            message: error.to_string(),
        })?;
        let path = match &request.channel {
            IssuanceChannel::Direct => validated.paths.full_license_log(&request.cluster, timestamp),
            IssuanceChannel::SelfService {
                ..
            } => validated.paths.access_log(&request.cluster, timestamp),
        }
        .map_err(store_error(key))?;
        self.store.write(&path, &bytes).map_err(store_error(key))?;

        if request.channel == IssuanceChannel::Direct {
            let verified = email_verified(&validated.email).map_err(store_error(key))?;
            if !self.store.exists(&verified).map_err(store_error(key))? {
                self.store
                    .write(&verified, format_rfc3339(timestamp).as_bytes())
                    .map_err(store_error(key))?;
            }
        }
        Ok(entry)
    }
}

// crates/license-authority-core/src/runtime/authority.rs
// ============================================================================
// Module: Certificate Authority Bootstrap
// Description: Lazily created, persisted root signing key and certificate.
// Purpose: Own the root key lifetime and sign license credentials.
// Dependencies: rcgen, x509-parser, crate::interfaces, crate::runtime::audit
// ============================================================================

//! ## Overview
//! [`CertificateAuthority::get_or_init`] loads the root key and self-signed
//! certificate from the issuer's reserved paths, or creates and persists them
//! on first use. The authority is constructed once per process and shared by
//! handle; it is never rotated automatically.
//!
//! Invariants:
//! - Exactly one root key exists per issuer path.
//! - The key is persisted before the certificate, so a certificate without a
//!   key is reported as corruption rather than silently replaced.
//! - A stored certificate must be a CA whose public key matches the stored
//!   key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Mutex;

use rcgen::BasicConstraints;
use rcgen::Certificate;
use rcgen::CertificateParams;
use rcgen::DistinguishedName;
use rcgen::DnType;
use rcgen::IsCa;
use rcgen::Issuer;
use rcgen::KeyPair;
use rcgen::KeyUsagePurpose;
use rcgen::PublicKeyData;
use rcgen::SigningKey;
use thiserror::Error;
use time::Duration;
use time::OffsetDateTime;
use x509_parser::pem::parse_x509_pem;

use crate::core::identifiers::IssuerName;
use crate::core::paths::authority_certificate;
use crate::core::paths::authority_key;
use crate::core::time::Clock;
use crate::core::time::truncate_to_seconds;
use crate::interfaces::BlobStore;
use crate::interfaces::StoreError;
use crate::runtime::audit::AuditSink;
use crate::runtime::audit::AuthorityEvent;
use crate::runtime::certificate::PEM_CERTIFICATE_LABEL;
use crate::runtime::certificate::random_serial;
use crate::runtime::certificate::sha256_hex;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default root certificate lifetime in days.
pub const DEFAULT_CA_VALIDITY_DAYS: u32 = 3650;
/// Default root certificate common name.
pub const DEFAULT_CA_COMMON_NAME: &str = "License Authority Root CA";

/// Serializes bootstrap within one process.
static BOOTSTRAP_LOCK: Mutex<()> = Mutex::new(());

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Certificate authority errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
    /// Blob store failure.
    #[error("authority store error: {0}")]
    Store(String),
    /// Key generation or signing failure.
    #[error("authority crypto error: {0}")]
    Crypto(String),
    /// Persisted authority material is unusable.
    #[error("authority material corrupt: {0}")]
    Corrupt(String),
    /// Options are invalid.
    #[error("invalid authority options: {0}")]
    Invalid(String),
}

impl From<StoreError> for AuthorityError {
    fn from(error: StoreError) -> Self {
        Self::Store(error.to_string())
    }
}

impl From<rcgen::Error> for AuthorityError {
    fn from(error: rcgen::Error) -> Self {
        Self::Crypto(error.to_string())
    }
}

// ============================================================================
// SECTION: Options
// ============================================================================

/// Certificate authority bootstrap options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityOptions {
    /// Issuer namespace selecting the storage prefix.
    pub issuer: IssuerName,
    /// Root certificate common name.
    pub common_name: String,
    /// Root certificate lifetime in days.
    pub validity_days: u32,
}

impl Default for AuthorityOptions {
    fn default() -> Self {
        Self {
            issuer: IssuerName::default_issuer(),
            common_name: DEFAULT_CA_COMMON_NAME.to_string(),
            validity_days: DEFAULT_CA_VALIDITY_DAYS,
        }
    }
}

// ============================================================================
// SECTION: Certificate Authority
// ============================================================================

/// Loaded root signing key and certificate.
pub struct CertificateAuthority {
    /// Issuer namespace.
    issuer_name: IssuerName,
    /// Root certificate PEM.
    certificate_pem: String,
    /// Root certificate expiry.
    not_after: OffsetDateTime,
    /// Signing issuer built from the root certificate and key.
    issuer: Issuer<'static, KeyPair>,
}

impl fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("issuer_name", &self.issuer_name)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

impl CertificateAuthority {
    /// Loads the authority for `options.issuer`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError`] when storage fails, key generation fails,
    /// or persisted material cannot be parsed.
    pub fn get_or_init(
        store: &dyn BlobStore,
        options: &AuthorityOptions,
        clock: &dyn Clock,
        audit: &dyn AuditSink,
    ) -> Result<Self, AuthorityError> {
        if options.validity_days == 0 {
            return Err(AuthorityError::Invalid("validity_days must be greater than zero".to_string()));
        }
        let cert_path = authority_certificate(&options.issuer)?;
        let key_path = authority_key(&options.issuer)?;
        let _guard = BOOTSTRAP_LOCK
            .lock()
            .map_err(|_| AuthorityError::Store("authority bootstrap mutex poisoned".to_string()))?;

        let certificate = store.read(&cert_path)?;
        let key = store.read(&key_path)?;
        let (authority, action) = match (certificate, key) {
            (Some(certificate), Some(key)) => {
                (Self::load(options.issuer.clone(), &certificate, &key)?, "ca_loaded")
            }
            (Some(_), None) => {
                return Err(AuthorityError::Corrupt(format!(
                    "certificate present without key at {key_path}"
                )));
            }
            (None, _) => (Self::create(store, options, clock, &cert_path, &key_path)?, "ca_created"),
        };
        audit.record_authority(&AuthorityEvent::new(
            action,
            authority.issuer_name.to_string(),
            sha256_hex(authority.certificate_pem.as_bytes()),
        ));
        Ok(authority)
    }

    /// Parses persisted PEM material.
    fn load(issuer_name: IssuerName, certificate: &[u8], key: &[u8]) -> Result<Self, AuthorityError> {
        let certificate_pem = std::str::from_utf8(certificate)
            .map_err(|_| AuthorityError::Corrupt("certificate is not utf-8".to_string()))?
            .to_string();
        let key_pem = std::str::from_utf8(key)
            .map_err(|_| AuthorityError::Corrupt("key is not utf-8".to_string()))?;
        let key_pair =
            KeyPair::from_pem(key_pem).map_err(|err| AuthorityError::Corrupt(err.to_string()))?;
        let (_, pem) = parse_x509_pem(certificate)
            .map_err(|err| AuthorityError::Corrupt(format!("certificate pem decode failed: {err}")))?;
        if pem.label != PEM_CERTIFICATE_LABEL {
            return Err(AuthorityError::Corrupt(format!("unexpected pem label {}", pem.label)));
        }
        let x509 = pem
            .parse_x509()
            .map_err(|err| AuthorityError::Corrupt(format!("certificate parse failed: {err}")))?;
        if !x509.is_ca() {
            return Err(AuthorityError::Corrupt("stored certificate is not a CA".to_string()));
        }
        if key_pair.subject_public_key_info() != x509.public_key().raw {
            return Err(AuthorityError::Corrupt("key does not match certificate".to_string()));
        }
        let not_after = x509.validity().not_after.to_datetime();
        let issuer = Issuer::from_ca_cert_pem(&certificate_pem, key_pair)
            .map_err(|err| AuthorityError::Corrupt(err.to_string()))?;
        Ok(Self {
            issuer_name,
            certificate_pem,
            not_after,
            issuer,
        })
    }

    /// Generates and persists a new root key and certificate.
    fn create(
        store: &dyn BlobStore,
        options: &AuthorityOptions,
        clock: &dyn Clock,
        cert_path: &str,
        key_path: &str,
    ) -> Result<Self, AuthorityError> {
        let key_pair = KeyPair::generate()?;
        let now = truncate_to_seconds(clock.now());
        let mut params = CertificateParams::default();
        let mut name = DistinguishedName::new();
        name.push(DnType::CommonName, options.common_name.as_str());
        params.distinguished_name = name;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        params.not_before = now;
        params.not_after = now + Duration::days(i64::from(options.validity_days));
        params.serial_number = Some(random_serial());
        let certificate = params.self_signed(&key_pair)?;
        let certificate_pem = certificate.pem();

        store.write(key_path, key_pair.serialize_pem().as_bytes())?;
        store.write(cert_path, certificate_pem.as_bytes())?;

        let not_after = params.not_after;
        Ok(Self {
            issuer_name: options.issuer.clone(),
            certificate_pem,
            not_after,
            issuer: Issuer::new(params, key_pair),
        })
    }

    /// Returns the issuer namespace.
    #[must_use]
    pub const fn issuer_name(&self) -> &IssuerName {
        &self.issuer_name
    }

    /// Returns the root certificate PEM.
    #[must_use]
    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    /// Returns the root certificate expiry.
    #[must_use]
    pub const fn not_after(&self) -> OffsetDateTime {
        self.not_after
    }

    /// Signs `params` for the subject key `key`.
    pub(crate) fn sign(
        &self,
        params: &CertificateParams,
        key: &KeyPair,
    ) -> Result<Certificate, AuthorityError> {
        Ok(params.signed_by(key, &self.issuer)?)
    }

    /// Signs raw bytes with the root key.
    pub(crate) fn sign_bytes(&self, message: &[u8]) -> Result<Vec<u8>, AuthorityError> {
        Ok(self.issuer.key().sign(message)?)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

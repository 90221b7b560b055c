// crates/license-authority-core/src/core/paths.rs
// ============================================================================
// Module: Storage Path Scheme
// Description: Deterministic blob-store paths for authority and license records.
// Purpose: Centralize the path layout and reject unsafe path components.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Every persisted record lives at a deterministic path derived from the
//! request identifiers. Components are validated before use so a request can
//! never address a path outside its own `(domain, product, cluster)` subtree.
//!
//! | Record | Path |
//! |---|---|
//! | CA | `certificates[/<issuer>]/ca.crt`, `ca.key` |
//! | Agreement | `domains/<domain>/products/<product>/agreement.json` |
//! | Certificate | `domains/<domain>/products/<product>/clusters/<cluster>/tls.crt` |
//! | Key | `domains/<domain>/products/<product>/clusters/<cluster>/tls.key` |
//! | Access log | `.../clusters/<cluster>/accesslog/<rfc3339>` |
//! | Full-license log | `.../clusters/<cluster>/full-license-issued/<rfc3339>` |
//! | Email markers | `domains/<domain>/emails/<email>/{verified,banned}` |

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;

use crate::core::identifiers::ClusterId;
use crate::core::identifiers::Domain;
use crate::core::identifiers::EmailAddress;
use crate::core::identifiers::IssuerName;
use crate::core::identifiers::ProductId;
use crate::core::time::format_rfc3339;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Root prefix for certificate authority material.
pub const CERTIFICATES_ROOT: &str = "certificates";
/// Root prefix for per-domain records.
pub const DOMAINS_ROOT: &str = "domains";
/// Maximum length of a single path component.
pub const MAX_PATH_COMPONENT_LENGTH: usize = 255;

// ============================================================================
// SECTION: Component Validation
// ============================================================================

/// Validates a single path component.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] when the component is empty, too long, a
/// relative marker, or contains separators or control characters.
pub fn validate_component(field: &str, value: &str) -> Result<(), StoreError> {
    if value.is_empty() {
        return Err(StoreError::Invalid(format!("{field} must be non-empty")));
    }
    if value.len() > MAX_PATH_COMPONENT_LENGTH {
        return Err(StoreError::Invalid(format!("{field} path component too long")));
    }
    if value == "." || value == ".." {
        return Err(StoreError::Invalid(format!("{field} must not be a relative marker")));
    }
    if value.chars().any(|ch| ch == '/' || ch == '\\' || ch.is_control()) {
        return Err(StoreError::Invalid(format!("{field} contains a forbidden character")));
    }
    Ok(())
}

/// Validates a full blob path (slash-separated components).
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] when any component is invalid.
pub fn validate_path(path: &str) -> Result<(), StoreError> {
    for component in path.split('/') {
        validate_component("path", component)?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Certificate Authority Paths
// ============================================================================

/// Returns the directory holding the CA material for an issuer.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] for unsafe issuer names.
pub fn authority_dir(issuer: &IssuerName) -> Result<String, StoreError> {
    if issuer.is_default() {
        return Ok(CERTIFICATES_ROOT.to_string());
    }
    validate_component("issuer", issuer.as_str())?;
    Ok(format!("{CERTIFICATES_ROOT}/{issuer}", issuer = issuer.as_str()))
}

/// Returns the CA certificate path for an issuer.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] for unsafe issuer names.
pub fn authority_certificate(issuer: &IssuerName) -> Result<String, StoreError> {
    Ok(format!("{}/ca.crt", authority_dir(issuer)?))
}

/// Returns the CA private key path for an issuer.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] for unsafe issuer names.
pub fn authority_key(issuer: &IssuerName) -> Result<String, StoreError> {
    Ok(format!("{}/ca.key", authority_dir(issuer)?))
}

// ============================================================================
// SECTION: License Paths
// ============================================================================

/// Path builder for a `(domain, product)` license and its clusters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicensePaths {
    /// `domains/<domain>/products/<product>` prefix.
    product_root: String,
}

impl LicensePaths {
    /// Creates a path builder after validating the components.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for unsafe components.
    pub fn new(domain: &Domain, product: &ProductId) -> Result<Self, StoreError> {
        validate_component("domain", domain.as_str())?;
        validate_component("product", product.as_str())?;
        Ok(Self {
            product_root: format!(
                "{DOMAINS_ROOT}/{domain}/products/{product}",
                domain = domain.as_str(),
                product = product.as_str()
            ),
        })
    }

    /// Returns the agreement record path.
    #[must_use]
    pub fn agreement(&self) -> String {
        format!("{}/agreement.json", self.product_root)
    }

    /// Returns the prefix under which all cluster records live.
    #[must_use]
    pub fn clusters_prefix(&self) -> String {
        format!("{}/clusters/", self.product_root)
    }

    /// Returns the directory for one cluster.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for unsafe cluster identifiers.
    pub fn cluster_dir(&self, cluster: &ClusterId) -> Result<String, StoreError> {
        validate_component("cluster", cluster.as_str())?;
        Ok(format!("{}{}", self.clusters_prefix(), cluster.as_str()))
    }

    /// Returns the issued certificate path for a cluster.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for unsafe cluster identifiers.
    pub fn certificate(&self, cluster: &ClusterId) -> Result<String, StoreError> {
        Ok(format!("{}/tls.crt", self.cluster_dir(cluster)?))
    }

    /// Returns the issued private key path for a cluster.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for unsafe cluster identifiers.
    pub fn private_key(&self, cluster: &ClusterId) -> Result<String, StoreError> {
        Ok(format!("{}/tls.key", self.cluster_dir(cluster)?))
    }

    /// Returns the self-service access log path for an event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for unsafe cluster identifiers.
    pub fn access_log(
        &self,
        cluster: &ClusterId,
        at: OffsetDateTime,
    ) -> Result<String, StoreError> {
        Ok(format!("{}/accesslog/{}", self.cluster_dir(cluster)?, format_rfc3339(at)))
    }

    /// Returns the full-license issue log path for an event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for unsafe cluster identifiers.
    pub fn full_license_log(
        &self,
        cluster: &ClusterId,
        at: OffsetDateTime,
    ) -> Result<String, StoreError> {
        Ok(format!("{}/full-license-issued/{}", self.cluster_dir(cluster)?, format_rfc3339(at)))
    }

    /// Extracts the cluster identifier from a path under [`Self::clusters_prefix`].
    #[must_use]
    pub fn cluster_of(&self, path: &str) -> Option<ClusterId> {
        let rest = path.strip_prefix(&self.clusters_prefix())?;
        let cluster = rest.split('/').next()?;
        if cluster.is_empty() { None } else { Some(ClusterId::new(cluster)) }
    }
}

// ============================================================================
// SECTION: Email Marker Paths
// ============================================================================

/// Returns the directory holding markers for an email address.
fn email_dir(email: &EmailAddress) -> Result<String, StoreError> {
    let domain = email.domain();
    validate_component("domain", domain.as_str())?;
    validate_component("email", email.as_str())?;
    Ok(format!(
        "{DOMAINS_ROOT}/{domain}/emails/{email}",
        domain = domain.as_str(),
        email = email.as_str()
    ))
}

/// Returns the verified marker path for an email address.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] for unsafe addresses.
pub fn email_verified(email: &EmailAddress) -> Result<String, StoreError> {
    Ok(format!("{}/verified", email_dir(email)?))
}

/// Returns the banned marker path for an email address.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] for unsafe addresses.
pub fn email_banned(email: &EmailAddress) -> Result<String, StoreError> {
    Ok(format!("{}/banned", email_dir(email)?))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    //! Path layout tests.
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions.")]

    use super::*;

    #[test]
    fn authority_paths_respect_issuer_namespace() {
        assert_eq!(
            authority_certificate(&IssuerName::default_issuer()).expect("path"),
            "certificates/ca.crt"
        );
        assert_eq!(authority_key(&IssuerName::new("acme")).expect("path"), "certificates/acme/ca.key");
        assert!(authority_dir(&IssuerName::new("../etc")).is_err());
    }

    #[test]
    fn license_paths_follow_layout() {
        let paths =
            LicensePaths::new(&Domain::new("example.com"), &ProductId::new("platform-enterprise"))
                .expect("paths");
        let cluster = ClusterId::new("c1");
        assert_eq!(paths.agreement(), "domains/example.com/products/platform-enterprise/agreement.json");
        assert_eq!(
            paths.certificate(&cluster).expect("path"),
            "domains/example.com/products/platform-enterprise/clusters/c1/tls.crt"
        );
        let at = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("timestamp");
        assert_eq!(
            paths.full_license_log(&cluster, at).expect("path"),
            "domains/example.com/products/platform-enterprise/clusters/c1/full-license-issued/2023-11-14T22:13:20Z"
        );
        assert_eq!(
            paths.cluster_of("domains/example.com/products/platform-enterprise/clusters/c1/tls.crt"),
            Some(cluster)
        );
    }

    #[test]
    fn email_marker_paths() {
        let email = EmailAddress::parse("bob@example.com").expect("email");
        assert_eq!(
            email_banned(&email).expect("path"),
            "domains/example.com/emails/bob@example.com/banned"
        );
    }

    #[test]
    fn component_validation_rejects_traversal() {
        assert!(validate_component("x", "..").is_err());
        assert!(validate_component("x", "a/b").is_err());
        assert!(validate_component("x", "").is_err());
        assert!(validate_path("a/b/c").is_ok());
        assert!(validate_path("a//c").is_err());
    }
}

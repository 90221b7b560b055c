// crates/license-authority-core/src/runtime/mod.rs
// ============================================================================
// Module: License Authority Runtime
// Description: CA bootstrap, credential signing, issuance, storage, and audit.
// Purpose: Execute license issuance against a blob store.
// Dependencies: crate::{core, interfaces}, rcgen, sha2
// ============================================================================

//! ## Overview
//! Runtime components that touch storage or key material. The
//! [`CertificateAuthority`] owns the root key, [`LicenseIssuer`] applies the
//! reuse and renewal policy, and [`AuditSink`] implementations record
//! structured events.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod authority;
pub mod certificate;
pub mod issuance;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use audit::AuthorityEvent;
pub use audit::FileAuditSink;
pub use audit::IssuanceEvent;
pub use audit::NoopAuditSink;
pub use audit::SchedulerEvent;
pub use audit::StderrAuditSink;
pub use authority::AuthorityError;
pub use authority::AuthorityOptions;
pub use authority::CertificateAuthority;
pub use certificate::ParseResult;
pub use issuance::IssuanceError;
pub use issuance::IssuedLicense;
pub use issuance::IssuerOptions;
pub use issuance::LicenseIssuer;
pub use store::InMemoryBlobStore;
pub use store::SharedBlobStore;

// crates/license-authority-core/src/lib.rs
// ============================================================================
// Module: License Authority Core Library
// Description: Public API surface for the license authority core.
// Purpose: Expose the data model, storage interface, and issuance runtime.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! License authority core issues time-bounded X.509 license credentials for
//! products, bound to a customer cluster and signed by a lazily bootstrapped
//! certificate authority. All state lives in a path-addressed [`BlobStore`];
//! this crate ships an in-memory implementation and the storage contract used
//! by durable backends.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::BlobStore;
pub use interfaces::StoreError;
pub use runtime::AuditSink;
pub use runtime::AuthorityError;
pub use runtime::AuthorityEvent;
pub use runtime::AuthorityOptions;
pub use runtime::CertificateAuthority;
pub use runtime::FileAuditSink;
pub use runtime::InMemoryBlobStore;
pub use runtime::IssuanceError;
pub use runtime::IssuanceEvent;
pub use runtime::IssuedLicense;
pub use runtime::IssuerOptions;
pub use runtime::LicenseIssuer;
pub use runtime::NoopAuditSink;
pub use runtime::ParseResult;
pub use runtime::SchedulerEvent;
pub use runtime::SharedBlobStore;
pub use runtime::StderrAuditSink;

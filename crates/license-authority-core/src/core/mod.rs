// crates/license-authority-core/src/core/mod.rs
// ============================================================================
// Module: License Authority Core Types
// Description: Identifiers, time, products, flags, paths, and license records.
// Purpose: Group the data model shared by issuance and scheduling.
// Dependencies: serde, time, thiserror
// ============================================================================

//! ## Overview
//! Data model for the license authority. Types here carry no I/O; storage and
//! signing live in [`crate::runtime`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod email;
pub mod flags;
pub mod identifiers;
pub mod license;
pub mod paths;
pub mod products;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use email::EmailPolicy;
pub use flags::FeatureFlags;
pub use flags::FlagError;
pub use identifiers::ClusterId;
pub use identifiers::Domain;
pub use identifiers::EmailAddress;
pub use identifiers::IssuerName;
pub use identifiers::ProductId;
pub use identifiers::TaskId;
pub use license::AccessLogEntry;
pub use license::IssuanceChannel;
pub use license::IssuanceOutcome;
pub use license::LicenseRequest;
pub use license::LicenseTerm;
pub use license::ProductLicense;
pub use paths::LicensePaths;
pub use products::ProductDefinition;
pub use products::ProductRegistry;
pub use products::ProductTier;
pub use time::Clock;
pub use time::ManualClock;
pub use time::SystemClock;

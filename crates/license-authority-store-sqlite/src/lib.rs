// crates/license-authority-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Blob Store
// Description: Durable BlobStore backend using SQLite WAL.
// Purpose: Provide crash-safe persistence for license and scheduler records.
// Dependencies: license-authority-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`BlobStore`] implementation. Each
//! blob is stored with its SHA-256 digest and verified on read, so torn or
//! tampered rows fail closed instead of feeding the issuer or scheduler.
//!
//! [`BlobStore`]: license_authority_core::BlobStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_BLOB_BYTES;
pub use store::SqliteBlobStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;

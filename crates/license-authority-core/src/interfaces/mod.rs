// crates/license-authority-core/src/interfaces/mod.rs
// ============================================================================
// Module: License Authority Interfaces
// Description: Backend-agnostic blob storage contract.
// Purpose: Define the durable storage surface shared by issuance and scheduling.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! The authority and the scheduler persist everything through a
//! path-addressed [`BlobStore`]. Implementations must provide at least
//! read-your-writes consistency per key and atomic single-key writes.
//! Conflicting access to the same key must be serialized internally.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Blob Store
// ============================================================================

/// Blob store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("blob store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("blob store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("blob store version mismatch: {0}")]
    VersionMismatch(String),
    /// Path or payload is invalid.
    #[error("blob store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("blob store error: {0}")]
    Store(String),
    /// Store handle has been closed.
    #[error("blob store closed")]
    Closed,
}

/// Durable byte storage keyed by slash-separated paths.
pub trait BlobStore: Send + Sync {
    /// Returns true when a blob exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot be queried.
    fn exists(&self, path: &str) -> Result<bool, StoreError>;

    /// Reads the blob at `path`, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot be read.
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes (creates or replaces) the blob at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write is not durable.
    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Deletes the blob at `path`. Deleting a missing blob is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Lists blob paths starting with `prefix`, in lexical order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot be listed.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Releases the store handle. Later calls may fail with [`StoreError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the handle cannot be closed cleanly.
    fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

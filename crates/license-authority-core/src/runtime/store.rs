// crates/license-authority-core/src/runtime/store.rs
// ============================================================================
// Module: License Authority In-Memory Store
// Description: In-memory blob store and shared store wrapper.
// Purpose: Provide a deterministic store for tests and ephemeral deployments.
// Dependencies: crate::interfaces, crate::core::paths
// ============================================================================

//! ## Overview
//! [`InMemoryBlobStore`] keeps blobs in a mutex-protected ordered map, so
//! `list` is naturally lexical. It is not durable; use the SQLite backend for
//! anything that must survive a restart. [`SharedBlobStore`] wraps any store
//! behind an `Arc` so it can be cloned into the issuer and the scheduler.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use crate::core::paths::validate_path;
use crate::interfaces::BlobStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory blob store for tests and ephemeral deployments.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBlobStore {
    /// Blob map protected by a mutex.
    blobs: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    /// Set once the store has been closed.
    closed: Arc<AtomicBool>,
}

impl InMemoryBlobStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(Mutex::new(BTreeMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the number of stored blobs.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Store`] when the mutex is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    /// Returns true when no blobs are stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Store`] when the mutex is poisoned.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.is_empty())
    }

    /// Locks the blob map, failing once the store is closed.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>, StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        self.blobs.lock().map_err(|_| StoreError::Store("blob store mutex poisoned".to_string()))
    }
}

impl BlobStore for InMemoryBlobStore {
    fn exists(&self, path: &str) -> Result<bool, StoreError> {
        validate_path(path)?;
        Ok(self.lock()?.contains_key(path))
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        validate_path(path)?;
        Ok(self.lock()?.get(path).cloned())
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StoreError> {
        validate_path(path)?;
        self.lock()?.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        validate_path(path)?;
        self.lock()?.remove(path);
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let guard = self.lock()?;
        Ok(guard
            .range(prefix.to_string() ..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, _)| path.clone())
            .collect())
    }

    fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

// ============================================================================
// SECTION: Shared Store Wrapper
// ============================================================================

/// Shared blob store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedBlobStore {
    /// Inner store implementation.
    inner: Arc<dyn BlobStore>,
}

impl SharedBlobStore {
    /// Wraps a blob store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl BlobStore + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            inner: store,
        }
    }

    /// Returns the inner shared handle.
    #[must_use]
    pub fn handle(&self) -> Arc<dyn BlobStore> {
        Arc::clone(&self.inner)
    }
}

impl BlobStore for SharedBlobStore {
    fn exists(&self, path: &str) -> Result<bool, StoreError> {
        self.inner.exists(path)
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.read(path)
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.inner.write(path, bytes)
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.inner.delete(path)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.list(prefix)
    }

    fn close(&self) -> Result<(), StoreError> {
        self.inner.close()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

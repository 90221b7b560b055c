// crates/license-authority-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Blob Store
// Description: Durable BlobStore backed by SQLite WAL.
// Purpose: Persist path-addressed blobs with digest verification.
// Dependencies: license-authority-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`BlobStore`] using `SQLite`. Each write
//! replaces one row atomically; reads verify the stored SHA-256 digest and
//! fail closed on mismatch. A single connection is shared behind a mutex, so
//! conflicting access to the same key is serialized.

// ============================================================================//
// SECTION: Imports
// ============================================================================//

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use license_authority_core::BlobStore;
use license_authority_core::StoreError;
use license_authority_core::core::paths::validate_path;
use license_authority_core::core::time::unix_millis;
use license_authority_core::runtime::certificate::sha256_hex;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================//
// SECTION: Constants
// ============================================================================//

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum blob size accepted by the store.
pub const MAX_BLOB_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================//
// SECTION: Config
// ============================================================================//

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` blob store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config for `path` with default pragmas.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================//
// SECTION: Errors
// ============================================================================//

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or digest mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Blob exceeded configured size limits.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
    /// Store handle has been closed.
    #[error("sqlite store closed")]
    Closed,
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "blob exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
            SqliteStoreError::Closed => Self::Closed,
        }
    }
}

// ============================================================================//
// SECTION: Store
// ============================================================================//

/// `SQLite`-backed blob store with WAL support.
#[derive(Clone)]
pub struct SqliteBlobStore {
    /// Shared `SQLite` connection guarded by a mutex; `None` once closed.
    connection: Arc<Mutex<Option<Connection>>>,
}

impl SqliteBlobStore {
    /// Opens an `SQLite`-backed blob store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(Some(connection))),
        })
    }

    /// Locks the connection slot.
    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }

    /// Runs `op` against the open connection.
    fn with_connection<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, SqliteStoreError>,
    ) -> Result<T, SqliteStoreError> {
        let guard = self.lock()?;
        let connection = guard.as_ref().ok_or(SqliteStoreError::Closed)?;
        op(connection)
    }

    /// Reads and verifies a blob.
    fn read_blob(&self, path: &str) -> Result<Option<Vec<u8>>, SqliteStoreError> {
        let row = self.with_connection(|connection| {
            let metadata: Option<(i64, String)> = connection
                .query_row(
                    "SELECT length(data), data_hash FROM blobs WHERE path = ?1",
                    params![path],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let Some((length, hash)) = metadata else {
                return Ok(None);
            };
            let length = usize::try_from(length).map_err(|_| {
                SqliteStoreError::Invalid(format!("negative blob length for {path}"))
            })?;
            if length > MAX_BLOB_BYTES {
                return Err(SqliteStoreError::TooLarge {
                    max_bytes: MAX_BLOB_BYTES,
                    actual_bytes: length,
                });
            }
            let bytes: Vec<u8> = connection
                .query_row("SELECT data FROM blobs WHERE path = ?1", params![path], |row| {
                    row.get(0)
                })
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            Ok(Some((bytes, hash)))
        })?;
        let Some((bytes, hash)) = row else {
            return Ok(None);
        };
        if sha256_hex(&bytes) != hash {
            return Err(SqliteStoreError::Corrupt(format!("digest mismatch for {path}")));
        }
        Ok(Some(bytes))
    }

    /// Writes a blob with its digest.
    fn write_blob(&self, path: &str, bytes: &[u8]) -> Result<(), SqliteStoreError> {
        if bytes.len() > MAX_BLOB_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_BLOB_BYTES,
                actual_bytes: bytes.len(),
            });
        }
        let digest = sha256_hex(bytes);
        let updated_at = i64::try_from(unix_millis()).unwrap_or(i64::MAX);
        self.with_connection(|connection| {
            connection
                .execute(
                    "INSERT INTO blobs (path, data, data_hash, updated_at) VALUES (?1, ?2, ?3, \
                     ?4) ON CONFLICT(path) DO UPDATE SET data = excluded.data, data_hash = \
                     excluded.data_hash, updated_at = excluded.updated_at",
                    params![path, bytes, digest, updated_at],
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            Ok(())
        })
    }

    /// Lists paths under a prefix in lexical order.
    fn list_paths(&self, prefix: &str) -> Result<Vec<String>, SqliteStoreError> {
        self.with_connection(|connection| {
            let mut statement = connection
                .prepare(
                    "SELECT path FROM blobs WHERE substr(path, 1, length(?1)) = ?1 ORDER BY path",
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let rows = statement
                .query_map(params![prefix], |row| row.get::<_, String>(0))
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(|err| SqliteStoreError::Db(err.to_string()))
        })
    }
}

impl BlobStore for SqliteBlobStore {
    fn exists(&self, path: &str) -> Result<bool, StoreError> {
        validate_path(path)?;
        let found = self.with_connection(|connection| {
            connection
                .query_row("SELECT 1 FROM blobs WHERE path = ?1", params![path], |_| Ok(()))
                .optional()
                .map(|row| row.is_some())
                .map_err(|err| SqliteStoreError::Db(err.to_string()))
        })?;
        Ok(found)
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StoreError> {
        validate_path(path)?;
        self.read_blob(path).map_err(StoreError::from)
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StoreError> {
        validate_path(path)?;
        self.write_blob(path, bytes).map_err(StoreError::from)
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        validate_path(path)?;
        self.with_connection(|connection| {
            connection
                .execute("DELETE FROM blobs WHERE path = ?1", params![path])
                .map(|_| ())
                .map_err(|err| SqliteStoreError::Db(err.to_string()))
        })
        .map_err(StoreError::from)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.list_paths(prefix).map_err(StoreError::from)
    }

    fn close(&self) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        if let Some(connection) = guard.take() {
            connection
                .close()
                .map_err(|(_, err)| StoreError::from(SqliteStoreError::Db(err.to_string())))?;
        }
        drop(guard);
        Ok(())
    }
}

// ============================================================================//
// SECTION: Helpers
// ============================================================================//

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with durable defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS blobs (
                    path TEXT PRIMARY KEY,
                    data BLOB NOT NULL,
                    data_hash TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                );",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

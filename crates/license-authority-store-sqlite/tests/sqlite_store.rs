// crates/license-authority-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Validate SQLite BlobStore behavior.
// Purpose: Ensure durable persistence, prefix listing, and integrity checks.
// Dependencies: license-authority-store-sqlite, license-authority-core, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Conformance tests for the SQLite-backed blob store. Exercises reopen
//! durability, lexical prefix listing, digest verification against tampered
//! rows, schema version checks, and close semantics.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use license_authority_core::BlobStore;
use license_authority_core::StoreError;
use license_authority_store_sqlite::SqliteBlobStore;
use license_authority_store_sqlite::SqliteStoreConfig;
use license_authority_store_sqlite::SqliteStoreError;
use license_authority_store_sqlite::SqliteStoreMode;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn config(dir: &TempDir) -> SqliteStoreConfig {
    SqliteStoreConfig::new(dir.path().join("store.db"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn sqlite_store_round_trips_across_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = SqliteBlobStore::new(&config(&dir)).unwrap();
        store.write("certificates/ca.crt", b"pem").unwrap();
        store.write("certificates/ca.crt", b"pem-2").unwrap();
        store.close().unwrap();
    }
    let store = SqliteBlobStore::new(&config(&dir)).unwrap();
    assert_eq!(store.read("certificates/ca.crt").unwrap(), Some(b"pem-2".to_vec()));
    assert!(store.exists("certificates/ca.crt").unwrap());
    assert!(!store.exists("certificates/ca.key").unwrap());
    assert_eq!(store.read("certificates/ca.key").unwrap(), None);
}

#[test]
fn sqlite_store_lists_by_prefix_in_order() {
    let dir = TempDir::new().unwrap();
    let store = SqliteBlobStore::new(&config(&dir)).unwrap();
    store.write("scheduler/tasks/b", b"2").unwrap();
    store.write("scheduler/tasks/a", b"1").unwrap();
    store.write("scheduler/other/c", b"3").unwrap();
    store.write("scheduler/tasksx/d", b"4").unwrap();
    assert_eq!(
        store.list("scheduler/tasks/").unwrap(),
        vec!["scheduler/tasks/a".to_string(), "scheduler/tasks/b".to_string()]
    );
    store.delete("scheduler/tasks/a").unwrap();
    store.delete("scheduler/tasks/missing").unwrap();
    assert_eq!(store.list("scheduler/tasks/").unwrap(), vec!["scheduler/tasks/b".to_string()]);
}

#[test]
fn sqlite_store_detects_tampered_rows() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir);
    let store = SqliteBlobStore::new(&cfg).unwrap();
    store.write("domains/example.com/agreement.json", b"{}").unwrap();
    store.close().unwrap();

    let connection = rusqlite::Connection::open(&cfg.path).unwrap();
    connection
        .execute(
            "UPDATE blobs SET data = ?1 WHERE path = ?2",
            rusqlite::params![b"{\"x\":1}".to_vec(), "domains/example.com/agreement.json"],
        )
        .unwrap();
    drop(connection);

    let store = SqliteBlobStore::new(&cfg).unwrap();
    let result = store.read("domains/example.com/agreement.json");
    assert!(matches!(result, Err(StoreError::Corrupt(_))));
}

#[test]
fn sqlite_store_rejects_unknown_schema_version() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir);
    SqliteBlobStore::new(&cfg).unwrap().close().unwrap();
    let connection = rusqlite::Connection::open(&cfg.path).unwrap();
    connection.execute("UPDATE store_meta SET version = 99", rusqlite::params![]).unwrap();
    drop(connection);
    let result = SqliteBlobStore::new(&cfg);
    assert!(matches!(result, Err(SqliteStoreError::VersionMismatch(_))));
}

#[test]
fn sqlite_store_rejects_directory_path_and_unsafe_keys() {
    let dir = TempDir::new().unwrap();
    let result = SqliteBlobStore::new(&SqliteStoreConfig::new(dir.path()));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));

    let store = SqliteBlobStore::new(&config(&dir)).unwrap();
    assert!(matches!(store.write("domains/../ca.key", b"x"), Err(StoreError::Invalid(_))));
}

#[test]
fn sqlite_store_fails_closed_after_close() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(&dir);
    cfg.journal_mode = SqliteStoreMode::Delete;
    let store = SqliteBlobStore::new(&cfg).unwrap();
    let clone = store.clone();
    store.close().unwrap();
    assert_eq!(clone.read("a/b"), Err(StoreError::Closed));
    store.close().unwrap();
}

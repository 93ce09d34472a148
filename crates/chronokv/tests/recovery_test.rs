//! Commit failure rollback, crash recovery and format version checks

mod common;

use chronokv::prelude::*;
use chronokv::{ChronoError, FormatVersion, Value, WalToken};
use common::*;
use std::collections::BTreeMap;
use tempfile::TempDir;

fn default_values(pairs: &[(&str, &str)]) -> BTreeMap<String, Option<Value>> {
    pairs
        .iter()
        .map(|(k, v)| {
            let bytes = serde_json::to_vec(v).unwrap();
            (k.to_string(), Some(Value::from(bytes)))
        })
        .collect()
}

/// Leave the backend as a crash in the middle of a commit at `after` would
fn simulate_interrupted_commit(
    backend: &dyn StorageBackend,
    wal: &dyn WalTokenStore,
    before: Timestamp,
    after: Timestamp,
) {
    wal.write(MASTER_BRANCH_NAME, &WalToken::new(before, after).unwrap())
        .unwrap();
    backend
        .matrix(MASTER_BRANCH_NAME, DEFAULT_KEYSPACE)
        .unwrap()
        .unwrap()
        .put(after, &default_values(&[("a", "torn"), ("b", "torn")]))
        .unwrap();
    backend
        .create_matrix(MASTER_BRANCH_NAME, "half-created", after)
        .unwrap()
        .put(after, &default_values(&[("x", "torn")]))
        .unwrap();
}

#[test]
fn test_failed_commit_leaves_no_trace() {
    let backend = FaultyBackend::new();
    let db = open_db(Arc::new(backend.clone()), ChronoConfig::default());
    let base = commit_value(&db, MASTER_BRANCH_NAME, "a", "0");

    backend.set_failing(true);
    let mut tx = db.tx().unwrap();
    tx.put("a", "1").unwrap();
    tx.put_in("alpha", "k", "1").unwrap();
    tx.put_in(FAULTY_KEYSPACE, "k", "1").unwrap();
    let err = tx.commit().unwrap_err();
    backend.set_failing(false);

    assert!(err.is_commit_failure());
    assert!(matches!(err.root_cause(), ChronoError::Storage(msg) if msg.contains("injected")));
    assert_eq!(tx.timestamp(), base);

    assert_eq!(db.now(MASTER_BRANCH_NAME).unwrap(), base);
    assert!(backend.wal_tokens().read(MASTER_BRANCH_NAME).unwrap().is_none());

    let reader = db.read_only_tx().unwrap();
    assert_eq!(reader.get::<String>("a").unwrap().as_deref(), Some("0"));
    assert_eq!(reader.history(DEFAULT_KEYSPACE, "a").unwrap(), vec![base]);
    assert!(!reader.exists_in("alpha", "k").unwrap());
    assert!(!reader.keyspaces().unwrap().contains("alpha"));

    // The same changes go through once storage recovers
    let mut retry = db.tx().unwrap();
    retry.put("a", "1").unwrap();
    retry.put_in(FAULTY_KEYSPACE, "k", "1").unwrap();
    assert_eq!(retry.commit().unwrap().timestamp, Some(base + 1));
}

#[test]
fn test_failed_commit_does_not_store_metadata() {
    let backend = FaultyBackend::new();
    let db = open_db(Arc::new(backend.clone()), ChronoConfig::default());

    backend.set_failing(true);
    let mut tx = db.tx().unwrap();
    tx.put_in(FAULTY_KEYSPACE, "k", "1").unwrap();
    assert!(tx.commit_with_metadata("release").is_err());
    backend.set_failing(false);

    assert!(db
        .commit_timestamps_between(MASTER_BRANCH_NAME, 0, START + 10)
        .unwrap()
        .is_empty());
}

#[test]
fn test_interrupted_commit_is_rolled_back_on_open() {
    let backend = InMemoryBackend::new();
    let base = {
        let db = open_db(Arc::new(backend.clone()), ChronoConfig::default());
        commit_value(&db, MASTER_BRANCH_NAME, "a", "committed")
    };

    simulate_interrupted_commit(&backend, backend.wal_tokens().as_ref(), base, base + 1);

    let db = open_db(Arc::new(backend.clone()), ChronoConfig::default());
    assert!(backend.wal_tokens().read(MASTER_BRANCH_NAME).unwrap().is_none());
    assert_eq!(db.now(MASTER_BRANCH_NAME).unwrap(), base);

    let reader = db.read_only_tx().unwrap();
    assert_eq!(reader.get::<String>("a").unwrap().as_deref(), Some("committed"));
    assert!(!reader.exists("b").unwrap());
    assert_eq!(reader.history(DEFAULT_KEYSPACE, "a").unwrap(), vec![base]);
    assert!(!reader.keyspaces().unwrap().contains("half-created"));

    // Commits resume right after the recovered watermark
    assert_eq!(commit_value(&db, MASTER_BRANCH_NAME, "a", "next"), base + 1);
}

#[test]
fn test_clean_shutdown_needs_no_recovery() {
    let backend = InMemoryBackend::new();
    let base = {
        let db = open_db(Arc::new(backend.clone()), ChronoConfig::default());
        let base = commit_value(&db, MASTER_BRANCH_NAME, "a", "1");
        db.close().unwrap();
        base
    };

    let db = open_db(Arc::new(backend), ChronoConfig::default());
    assert_eq!(db.now(MASTER_BRANCH_NAME).unwrap(), base);
    assert_eq!(read_string(&db, MASTER_BRANCH_NAME, base, "a").as_deref(), Some("1"));
}

#[test]
fn test_file_wal_tokens_drive_recovery() {
    let wal_dir = TempDir::new().unwrap();
    let config = ChronoConfig::new().with_wal_dir(wal_dir.path());
    let backend = InMemoryBackend::new();

    let base = {
        let db = open_db(Arc::new(backend.clone()), config.clone());
        commit_value(&db, MASTER_BRANCH_NAME, "a", "committed")
    };

    let file_wal = FileWalTokenStore::open(wal_dir.path()).unwrap();
    simulate_interrupted_commit(&backend, &file_wal, base, base + 1);
    assert!(file_wal.read(MASTER_BRANCH_NAME).unwrap().is_some());

    let db = open_db(Arc::new(backend), config);
    assert!(file_wal.read(MASTER_BRANCH_NAME).unwrap().is_none());
    assert_eq!(
        read_string(&db, MASTER_BRANCH_NAME, base, "a").as_deref(),
        Some("committed")
    );
    assert!(!db.read_only_tx().unwrap().exists("b").unwrap());
}

#[test]
fn test_newer_format_version_aborts_open() {
    let backend = InMemoryBackend::new();
    backend.set_format_version(FormatVersion::new(99, 0, 0)).unwrap();

    let result = ChronoDb::builder(Arc::new(backend))
        .clock(manual_clock())
        .open();
    assert!(matches!(result, Err(ChronoError::VersionSkew { .. })));
}

#[test]
fn test_older_format_version_is_upgraded() {
    let backend = InMemoryBackend::new();
    backend.set_format_version(FormatVersion::new(0, 0, 1)).unwrap();

    let _db = open_db(Arc::new(backend.clone()), ChronoConfig::default());
    assert_eq!(backend.format_version().unwrap(), Some(FormatVersion::current()));
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = ChronoConfig::new().with_cache(true).with_cache_max_size(0);
    let result = ChronoDb::open(Arc::new(InMemoryBackend::new()), config);
    assert!(matches!(result, Err(ChronoError::Config(_))));
}

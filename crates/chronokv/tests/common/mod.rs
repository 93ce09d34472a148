//! Shared helpers for integration tests

#![allow(dead_code)]

use chronokv::prelude::*;
use chronokv::{
    BranchMetadata, ChronoError, CommitMetadataStore, FormatVersion, KeySetModifications,
    RangedGetResult, TemporalDataMatrix, TemporalEntry, TemporalKey, Timestamp, Value,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

/// Keyspace whose matrix writes fail while the backend's fault flag is set
pub const FAULTY_KEYSPACE: &str = "zzz";

/// First timestamp handed out by [`manual_clock`]
pub const START: Timestamp = 100;

static TRACING: Once = Once::new();

/// Install a test subscriber once per binary. Honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Frozen clock: commits get `START`, `START + 1`, ... in order
pub fn manual_clock() -> CommitClock {
    CommitClock::manual(START)
}

pub fn open_db(backend: Arc<dyn StorageBackend>, config: ChronoConfig) -> ChronoDb {
    init_tracing();
    ChronoDb::builder(backend)
        .config(config)
        .clock(manual_clock())
        .open()
        .unwrap()
}

/// In-memory database with a manual clock
pub fn memory_db() -> ChronoDb {
    open_db(Arc::new(InMemoryBackend::new()), ChronoConfig::default())
}

/// Commit `key = value` in the default keyspace of `branch`
pub fn commit_value<T: Serialize + ?Sized>(
    db: &ChronoDb,
    branch: &str,
    key: &str,
    value: &T,
) -> Timestamp {
    let mut tx = db.tx_on(branch).unwrap();
    tx.put(key, value).unwrap();
    tx.commit().unwrap().timestamp.unwrap()
}

pub fn read_string(db: &ChronoDb, branch: &str, timestamp: Timestamp, key: &str) -> Option<String> {
    db.read_only_tx_at(branch, timestamp)
        .unwrap()
        .get::<String>(key)
        .unwrap()
}

/// Backend that can be told to fail writes into [`FAULTY_KEYSPACE`]
#[derive(Clone)]
pub struct FaultyBackend {
    inner: InMemoryBackend,
    fail_writes: Arc<AtomicBool>,
}

impl FaultyBackend {
    pub fn new() -> Self {
        Self {
            inner: InMemoryBackend::new(),
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn inner(&self) -> &InMemoryBackend {
        &self.inner
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    fn wrap(&self, matrix: Arc<dyn TemporalDataMatrix>) -> Arc<dyn TemporalDataMatrix> {
        if matrix.keyspace() == FAULTY_KEYSPACE {
            Arc::new(FaultyMatrix {
                inner: matrix,
                fail_writes: self.fail_writes.clone(),
            })
        } else {
            matrix
        }
    }
}

impl StorageBackend for FaultyBackend {
    fn name(&self) -> &'static str {
        "faulty"
    }

    fn matrix(
        &self,
        branch: &str,
        keyspace: &str,
    ) -> chronokv::Result<Option<Arc<dyn TemporalDataMatrix>>> {
        Ok(self.inner.matrix(branch, keyspace)?.map(|m| self.wrap(m)))
    }

    fn create_matrix(
        &self,
        branch: &str,
        keyspace: &str,
        creation_timestamp: Timestamp,
    ) -> chronokv::Result<Arc<dyn TemporalDataMatrix>> {
        let matrix = self.inner.create_matrix(branch, keyspace, creation_timestamp)?;
        Ok(self.wrap(matrix))
    }

    fn matrices(&self, branch: &str) -> chronokv::Result<Vec<Arc<dyn TemporalDataMatrix>>> {
        Ok(self
            .inner
            .matrices(branch)?
            .into_iter()
            .map(|m| self.wrap(m))
            .collect())
    }

    fn drop_matrices_created_after(
        &self,
        branch: &str,
        timestamp: Timestamp,
    ) -> chronokv::Result<Vec<String>> {
        self.inner.drop_matrices_created_after(branch, timestamp)
    }

    fn commit_metadata_store(
        &self,
        branch: &str,
    ) -> chronokv::Result<Arc<dyn CommitMetadataStore>> {
        self.inner.commit_metadata_store(branch)
    }

    fn wal_tokens(&self) -> Arc<dyn WalTokenStore> {
        self.inner.wal_tokens()
    }

    fn load_branches(&self) -> chronokv::Result<Vec<BranchMetadata>> {
        self.inner.load_branches()
    }

    fn save_branch(&self, metadata: &BranchMetadata) -> chronokv::Result<()> {
        self.inner.save_branch(metadata)
    }

    fn now(&self, branch: &str) -> chronokv::Result<Option<Timestamp>> {
        self.inner.now(branch)
    }

    fn set_now(&self, branch: &str, timestamp: Timestamp) -> chronokv::Result<()> {
        self.inner.set_now(branch, timestamp)
    }

    fn format_version(&self) -> chronokv::Result<Option<FormatVersion>> {
        self.inner.format_version()
    }

    fn set_format_version(&self, version: FormatVersion) -> chronokv::Result<()> {
        self.inner.set_format_version(version)
    }
}

struct FaultyMatrix {
    inner: Arc<dyn TemporalDataMatrix>,
    fail_writes: Arc<AtomicBool>,
}

impl TemporalDataMatrix for FaultyMatrix {
    fn branch(&self) -> &str {
        self.inner.branch()
    }

    fn keyspace(&self) -> &str {
        self.inner.keyspace()
    }

    fn creation_timestamp(&self) -> Timestamp {
        self.inner.creation_timestamp()
    }

    fn get(&self, timestamp: Timestamp, key: &str) -> chronokv::Result<RangedGetResult> {
        self.inner.get(timestamp, key)
    }

    fn put(
        &self,
        timestamp: Timestamp,
        contents: &BTreeMap<String, Option<Value>>,
    ) -> chronokv::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ChronoError::Storage("injected write failure".into()));
        }
        self.inner.put(timestamp, contents)
    }

    fn history(&self, max_timestamp: Timestamp, key: &str) -> chronokv::Result<Vec<Timestamp>> {
        self.inner.history(max_timestamp, key)
    }

    fn modifications_between(
        &self,
        lower: Timestamp,
        upper: Timestamp,
    ) -> chronokv::Result<Vec<TemporalKey>> {
        self.inner.modifications_between(lower, upper)
    }

    fn insert_entries(&self, entries: Vec<TemporalEntry>) -> chronokv::Result<()> {
        self.inner.insert_entries(entries)
    }

    fn rollback(&self, timestamp: Timestamp) -> chronokv::Result<()> {
        self.inner.rollback(timestamp)
    }

    fn rollback_keys(
        &self,
        timestamp: Timestamp,
        keys: &BTreeSet<String>,
    ) -> chronokv::Result<()> {
        self.inner.rollback_keys(timestamp, keys)
    }

    fn last_commit_timestamp(&self, key: &str) -> chronokv::Result<Option<Timestamp>> {
        self.inner.last_commit_timestamp(key)
    }

    fn key_set_modifications(&self, timestamp: Timestamp) -> chronokv::Result<KeySetModifications> {
        self.inner.key_set_modifications(timestamp)
    }

    fn entries(&self, max_timestamp: Timestamp) -> chronokv::Result<Vec<TemporalEntry>> {
        self.inner.entries(max_timestamp)
    }
}

//! Database facade
//!
//! [`ChronoDb`] ties a storage backend, the branch registry and the per-branch
//! stores together. Opening a database checks the persisted format version,
//! loads every branch and rolls back commits interrupted by a crash.

use crate::branch::{Branch, BranchManager};
use crate::codec::{Codec, SerializationManager};
use crate::store::{StoreContext, TemporalKeyValueStore};
use crate::transaction::Transaction;
use crate::wal_file::FileWalTokenStore;
use chronokv_core::{
    ChronoConfig, ChronoError, CommitClock, DatabaseLock, FormatVersion, IndexManager,
    QualifiedKey, RangedGetResult, Result, StorageBackend, TemporalEntry, Timestamp,
    WalTokenStore, MASTER_BRANCH_NAME,
};
use chronokv_memory::InMemoryBackend;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

/// Temporal, branch-aware key-value database
pub struct ChronoDb {
    context: Arc<StoreContext>,
    branches: BranchManager,
    codec: Codec,
}

impl ChronoDb {
    /// Fresh database on an in-memory backend with default configuration
    pub fn in_memory() -> Result<Self> {
        Self::open(Arc::new(InMemoryBackend::new()), ChronoConfig::default())
    }

    pub fn open(backend: Arc<dyn StorageBackend>, config: ChronoConfig) -> Result<Self> {
        Self::builder(backend).config(config).open()
    }

    pub fn builder(backend: Arc<dyn StorageBackend>) -> ChronoDbBuilder {
        ChronoDbBuilder {
            backend,
            config: ChronoConfig::default(),
            clock: CommitClock::system(),
            index: None,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.context.is_closed() {
            return Err(ChronoError::InvalidState("database is closed".into()));
        }
        Ok(())
    }

    pub fn config(&self) -> &ChronoConfig {
        &self.context.config
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.context.backend
    }

    pub fn index_manager(&self) -> Option<&Arc<dyn IndexManager>> {
        self.context.index.as_ref()
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Read-write transaction on master at its current `now`
    pub fn tx(&self) -> Result<Transaction> {
        self.tx_on(MASTER_BRANCH_NAME)
    }

    pub fn tx_on(&self, branch: &str) -> Result<Transaction> {
        self.ensure_open()?;
        let store = self.branches.store(branch)?;
        let now = store.now();
        Ok(Transaction::new(store, now, false, self.codec))
    }

    /// Read-write transaction reading `branch` as of `timestamp`
    ///
    /// Commits from it are checked for blind overwrites against `timestamp`.
    pub fn tx_at(&self, branch: &str, timestamp: Timestamp) -> Result<Transaction> {
        self.ensure_open()?;
        let store = self.branches.store(branch)?;
        Self::check_not_future(&store, timestamp)?;
        Ok(Transaction::new(store, timestamp, false, self.codec))
    }

    pub fn read_only_tx(&self) -> Result<Transaction> {
        self.ensure_open()?;
        let store = self.branches.master()?;
        let now = store.now();
        Ok(Transaction::new(store, now, true, self.codec))
    }

    pub fn read_only_tx_at(&self, branch: &str, timestamp: Timestamp) -> Result<Transaction> {
        self.ensure_open()?;
        let store = self.branches.store(branch)?;
        Self::check_not_future(&store, timestamp)?;
        Ok(Transaction::new(store, timestamp, true, self.codec))
    }

    fn check_not_future(store: &TemporalKeyValueStore, timestamp: Timestamp) -> Result<()> {
        let now = store.now();
        if timestamp > now {
            return Err(ChronoError::InvalidTimestamp(format!(
                "timestamp {} is after now ({}) of branch '{}'",
                timestamp,
                now,
                store.name()
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Branches
    // ------------------------------------------------------------------

    /// Fork `name` from master at master's current `now`
    pub fn create_branch(&self, name: &str) -> Result<Arc<Branch>> {
        self.ensure_open()?;
        let now = self.branches.master()?.now();
        self.create_branch_from(MASTER_BRANCH_NAME, name, now)
    }

    pub fn create_branch_from(
        &self,
        parent: &str,
        name: &str,
        branching_timestamp: Timestamp,
    ) -> Result<Arc<Branch>> {
        self.ensure_open()?;
        let store = self.branches.create_branch(parent, name, branching_timestamp)?;
        Ok(store.branch().clone())
    }

    pub fn branch(&self, name: &str) -> Result<Arc<Branch>> {
        self.branches.branch(name)
    }

    pub fn branch_exists(&self, name: &str) -> bool {
        self.branches.exists(name)
    }

    pub fn branch_names(&self) -> Vec<String> {
        self.branches.branch_names()
    }

    /// Ancestors of `name`, master first, `name` itself excluded
    pub fn origins_recursive(&self, name: &str) -> Result<Vec<Arc<Branch>>> {
        self.branches.origins_recursive(name)
    }

    pub fn now(&self, branch: &str) -> Result<Timestamp> {
        Ok(self.branches.store(branch)?.now())
    }

    // ------------------------------------------------------------------
    // Commit metadata
    // ------------------------------------------------------------------

    /// Metadata stored with the commit at `timestamp` on `branch`
    pub fn commit_metadata<M: DeserializeOwned>(
        &self,
        branch: &str,
        timestamp: Timestamp,
    ) -> Result<Option<M>> {
        self.ensure_open()?;
        match self.branches.store(branch)?.commit_metadata(timestamp)? {
            Some(bytes) => Ok(Some(self.codec.deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Branch-local commit timestamps carrying metadata, in `[lower, upper]`
    pub fn commit_timestamps_between(
        &self,
        branch: &str,
        lower: Timestamp,
        upper: Timestamp,
    ) -> Result<Vec<Timestamp>> {
        self.ensure_open()?;
        self.branches
            .store(branch)?
            .commit_timestamps_between(lower, upper)
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Rebuild the secondary index of `branch`. Returns the indexed version count.
    pub fn reindex(&self, branch: &str) -> Result<usize> {
        self.ensure_open()?;
        self.branches.store(branch)?.reindex()
    }

    /// Run `f` while holding the exclusive database lock
    ///
    /// No commit or read on any branch makes progress until `f` returns.
    pub fn with_exclusive_access<R>(
        &self,
        f: impl FnOnce(&ExclusiveAccess<'_>) -> Result<R>,
    ) -> Result<R> {
        self.ensure_open()?;
        let _guard = self.context.database_lock.exclusive();
        f(&ExclusiveAccess { db: self })
    }

    /// Consistent snapshot of every branch-local entry of `branch`, by keyspace
    pub fn dump_entries(&self, branch: &str) -> Result<BTreeMap<String, Vec<TemporalEntry>>> {
        self.with_exclusive_access(|access| access.entries(branch))
    }

    /// Shut the database down
    ///
    /// Waits for in-flight operations, rolls back open incremental commits
    /// and rejects every later call. Idempotent.
    pub fn close(&self) -> Result<()> {
        let _guard = self.context.database_lock.exclusive();
        if self.context.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for store in self.branches.stores() {
            if let Some(process) = store.incremental().current() {
                warn!(
                    branch = store.name(),
                    owner = %process.owner,
                    "Closing with open incremental commit"
                );
                store.rollback_incremental_unlocked(process);
            }
        }
        info!("Database closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.context.is_closed()
    }
}

/// Read access granted by [`ChronoDb::with_exclusive_access`]
///
/// Bypasses the lock hierarchy: the exclusive database lock already excludes
/// every other reader and writer.
pub struct ExclusiveAccess<'a> {
    db: &'a ChronoDb,
}

impl ExclusiveAccess<'_> {
    pub fn branch_names(&self) -> Vec<String> {
        self.db.branches.branch_names()
    }

    pub fn now(&self, branch: &str) -> Result<Timestamp> {
        self.db.now(branch)
    }

    pub fn get(
        &self,
        branch: &str,
        timestamp: Timestamp,
        keyspace: &str,
        key: &str,
    ) -> Result<RangedGetResult> {
        self.db
            .branches
            .store(branch)?
            .ranged_get_unlocked(timestamp, &QualifiedKey::new(keyspace, key))
    }

    pub fn entries(&self, branch: &str) -> Result<BTreeMap<String, Vec<TemporalEntry>>> {
        self.db.branches.store(branch)?.entries_unlocked()
    }
}

/// Builder for [`ChronoDb`]
pub struct ChronoDbBuilder {
    backend: Arc<dyn StorageBackend>,
    config: ChronoConfig,
    clock: CommitClock,
    index: Option<Arc<dyn IndexManager>>,
}

impl ChronoDbBuilder {
    pub fn config(mut self, config: ChronoConfig) -> Self {
        self.config = config;
        self
    }

    /// Clock used for commit timestamps (a manual clock in tests)
    pub fn clock(mut self, clock: CommitClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn index_manager(mut self, index: Arc<dyn IndexManager>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn open(self) -> Result<ChronoDb> {
        self.config.validate()?;

        let wal: Arc<dyn WalTokenStore> = match &self.config.wal_dir {
            Some(dir) => Arc::new(FileWalTokenStore::open(dir)?),
            None => self.backend.wal_tokens(),
        };

        let current = FormatVersion::current();
        match self.backend.format_version()? {
            None => self.backend.set_format_version(current)?,
            Some(stored) => {
                current.check_readable(&stored)?;
                if stored < current {
                    info!(from = %stored, to = %current, "Upgrading format version");
                    self.backend.set_format_version(current)?;
                }
            }
        }

        let codec = Codec::from(self.config.codec);
        let context = Arc::new(StoreContext {
            backend: self.backend,
            wal,
            database_lock: Arc::new(DatabaseLock::new()),
            config: self.config,
            clock: self.clock,
            index: self.index,
            closed: Default::default(),
        });

        let branches = BranchManager::load(context.clone())?;
        let mut recovered = 0;
        for store in branches.stores() {
            if store.recover()? {
                recovered += 1;
            }
        }

        info!(
            backend = context.backend.name(),
            branches = branches.branch_names().len(),
            recovered,
            "Opened database"
        );
        Ok(ChronoDb {
            context,
            branches,
            codec,
        })
    }
}

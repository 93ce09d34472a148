//! Temporal key-value store: one instance per branch
//!
//! Orchestrates reads and writes across the branch's matrices, owns the
//! branch's locks, the commit protocol, the incremental commit state machine
//! and startup recovery.
//!
//! # Locking
//!
//! Public methods take a guard from [`BranchLocks`] and then call an
//! `*_unlocked` internal. Reads that fall through to the origin branch call
//! the origin's unlocked internals directly: they only touch timestamps at or
//! before the branching timestamp, which no commit on the origin can change.
//!
//! # Commit protocol
//!
//! 1. Reject if another transaction owns the incremental process
//! 2. Resolve the commit timestamp (reserved, or fresh and after `now`)
//! 3. Read current values at `now` for duplicate elimination and indexing
//! 4. Check for blind overwrites
//! 5. Persist the WAL token
//! 6. Write matrices, index, commit metadata, cache; advance `now`
//! 7. Clear the WAL token
//!
//! A failure in 6 or 7 rolls everything back to the pre-commit `now`.

use crate::branch::Branch;
use crate::change_set::ChangeSet;
use crate::incremental::{IncrementalCommitState, IncrementalProcess};
use chronokv_core::observe;
use chronokv_core::{
    BranchLocks, CacheLookup, ChronoConfig, ChronoError, ChronoIdentifier, CommitClock,
    CommitInfo, CommitMetadataStore, DatabaseLock, DuplicateVersionElimination, IndexChange,
    IndexManager, Period, PutOption, QualifiedKey, RangedGetResult, Result, StorageBackend,
    TemporalCache, TemporalEntry, TemporalKey, Timestamp, TransactionId, Value, WalToken,
    WalTokenStore, TIMESTAMP_INFINITY,
};
use chronokv_memory::InMemoryTemporalCache;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Collaborators shared by every branch of one database
pub(crate) struct StoreContext {
    pub backend: Arc<dyn StorageBackend>,
    pub wal: Arc<dyn WalTokenStore>,
    pub database_lock: Arc<DatabaseLock>,
    pub config: ChronoConfig,
    pub clock: CommitClock,
    pub index: Option<Arc<dyn IndexManager>>,
    pub closed: AtomicBool,
}

impl StoreContext {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Physical writes derived from a change set
#[derive(Default)]
struct WritePlan {
    /// keyspace -> key -> value
    writes: BTreeMap<String, BTreeMap<String, Option<Value>>>,
    /// Old/new pairs for the index (entries marked `NoIndex` excluded)
    index_changes: Vec<(QualifiedKey, IndexChange)>,
    /// keyspace -> keys whose earlier increment is undone, the final value
    /// being the one visible at `now`
    reverted: BTreeMap<String, BTreeSet<String>>,
    written: usize,
    skipped: usize,
}

impl WritePlan {
    fn is_empty(&self) -> bool {
        self.written == 0 && self.reverted.is_empty()
    }

    /// Written and reverted keys
    fn keys(&self) -> impl Iterator<Item = QualifiedKey> + '_ {
        self.writes
            .iter()
            .flat_map(|(keyspace, contents)| {
                contents
                    .keys()
                    .map(move |key| QualifiedKey::new(keyspace.clone(), key.clone()))
            })
            .chain(self.reverted_keys())
    }

    fn reverted_keys(&self) -> impl Iterator<Item = QualifiedKey> + '_ {
        self.reverted.iter().flat_map(|(keyspace, keys)| {
            keys.iter()
                .map(move |key| QualifiedKey::new(keyspace.clone(), key.clone()))
        })
    }

    fn cache_values(&self) -> BTreeMap<QualifiedKey, Option<Value>> {
        self.writes
            .iter()
            .flat_map(|(keyspace, contents)| {
                contents.iter().map(move |(key, value)| {
                    (QualifiedKey::new(keyspace.clone(), key.clone()), value.clone())
                })
            })
            .collect()
    }

    fn info(&self, timestamp: Option<Timestamp>, incremental: bool) -> CommitInfo {
        CommitInfo {
            timestamp,
            entries_written: self.written,
            entries_skipped: self.skipped,
            keyspaces_touched: self.writes.keys().cloned().collect(),
            incremental,
        }
    }
}

pub struct TemporalKeyValueStore {
    branch: Arc<Branch>,
    origin: Option<Arc<TemporalKeyValueStore>>,
    context: Arc<StoreContext>,
    commit_metadata: Arc<dyn CommitMetadataStore>,
    cache: Option<Arc<dyn TemporalCache>>,
    locks: BranchLocks,
    incremental: IncrementalCommitState,
}

impl TemporalKeyValueStore {
    pub(crate) fn new(
        context: Arc<StoreContext>,
        branch: Arc<Branch>,
        origin: Option<Arc<TemporalKeyValueStore>>,
    ) -> Result<Self> {
        let commit_metadata = context.backend.commit_metadata_store(branch.name())?;
        let cache = if context.config.cache_enabled {
            Some(Arc::new(InMemoryTemporalCache::with_policy(
                context.config.cache_max_size,
                context.config.cache_eviction,
            )) as Arc<dyn TemporalCache>)
        } else {
            None
        };
        let locks = BranchLocks::new(context.database_lock.clone());

        Ok(Self {
            branch,
            origin,
            context,
            commit_metadata,
            cache,
            locks,
            incremental: IncrementalCommitState::new(),
        })
    }

    pub fn branch(&self) -> &Arc<Branch> {
        &self.branch
    }

    pub fn name(&self) -> &str {
        self.branch.name()
    }

    pub fn origin(&self) -> Option<&Arc<TemporalKeyValueStore>> {
        self.origin.as_ref()
    }

    pub fn now(&self) -> Timestamp {
        self.branch.now()
    }

    pub fn incremental(&self) -> &IncrementalCommitState {
        &self.incremental
    }

    /// Cached keys (0 when the cache is disabled)
    pub fn cache_size(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.size())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.context.is_closed() {
            return Err(ChronoError::InvalidState("database is closed".into()));
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Read path
    // ---------------------------------------------------------------------

    pub fn ranged_get(&self, timestamp: Timestamp, key: &QualifiedKey) -> Result<RangedGetResult> {
        self.ensure_open()?;
        let _guard = self.locks.read();
        self.ranged_get_unlocked(timestamp, key)
    }

    pub fn get(&self, timestamp: Timestamp, key: &QualifiedKey) -> Result<Option<Value>> {
        Ok(self.ranged_get(timestamp, key)?.into_value())
    }

    pub fn key_set(&self, timestamp: Timestamp, keyspace: &str) -> Result<BTreeSet<String>> {
        self.ensure_open()?;
        let _guard = self.locks.read();
        self.key_set_unlocked(timestamp, keyspace)
    }

    pub fn keyspaces(&self, timestamp: Timestamp) -> Result<BTreeSet<String>> {
        self.ensure_open()?;
        let _guard = self.locks.read();
        self.keyspaces_unlocked(timestamp)
    }

    /// Modification timestamps of `key` up to `timestamp`, newest first,
    /// including those inherited from the origin branch
    pub fn history(&self, timestamp: Timestamp, key: &QualifiedKey) -> Result<Vec<Timestamp>> {
        self.ensure_open()?;
        let _guard = self.locks.read();
        self.history_unlocked(timestamp, key)
    }

    pub fn modifications_between(
        &self,
        keyspace: &str,
        lower: Timestamp,
        upper: Timestamp,
    ) -> Result<Vec<TemporalKey>> {
        self.ensure_open()?;
        if upper < lower {
            return Err(ChronoError::InvalidTimestamp(format!(
                "upper bound {} is below lower bound {}",
                upper, lower
            )));
        }
        let _guard = self.locks.read();
        self.modifications_between_unlocked(keyspace, lower, upper)
    }

    pub fn commit_metadata(&self, timestamp: Timestamp) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        let _guard = self.locks.read();
        self.commit_metadata.get(timestamp)
    }

    pub fn commit_timestamps_between(
        &self,
        lower: Timestamp,
        upper: Timestamp,
    ) -> Result<Vec<Timestamp>> {
        self.ensure_open()?;
        let _guard = self.locks.read();
        self.commit_metadata.timestamps_between(lower, upper)
    }

    pub(crate) fn ranged_get_unlocked(
        &self,
        timestamp: Timestamp,
        key: &QualifiedKey,
    ) -> Result<RangedGetResult> {
        let immutable = self.context.config.assume_cache_values_immutable;

        if let Some(cache) = &self.cache {
            if let CacheLookup::Hit(result) = cache.get(timestamp, key) {
                return Ok(if immutable { result } else { result.deep_copy() });
            }
        }

        let result = self.resolve_unlocked(timestamp, key)?;
        if let Some(cache) = &self.cache {
            if immutable {
                cache.cache(&result);
            } else {
                cache.cache(&result.deep_copy());
            }
        }
        Ok(result)
    }

    /// Local matrix first, then the origin at the re-based timestamp
    fn resolve_unlocked(
        &self,
        timestamp: Timestamp,
        key: &QualifiedKey,
    ) -> Result<RangedGetResult> {
        let local = match self.context.backend.matrix(self.name(), &key.keyspace)? {
            Some(matrix) => Some(matrix.get(timestamp, &key.key)?),
            None => None,
        };

        if let Some(result) = &local {
            if result.is_hit() {
                return Ok(result.clone());
            }
        }

        let Some(origin) = &self.origin else {
            return Ok(
                local.unwrap_or_else(|| RangedGetResult::miss(key.clone(), Period::eternal()))
            );
        };

        let branching = self.branch.branching_timestamp();
        let inherited = origin.ranged_get_unlocked(timestamp.min(branching), key)?;
        let local_upper = local.map_or(TIMESTAMP_INFINITY, |r| r.period().to());
        let inherited_period = inherited.period();

        // Origin changes after the fork point never reach this branch
        let upper = if inherited_period.to() > branching {
            local_upper
        } else {
            inherited_period.to().min(local_upper)
        };
        Ok(inherited.with_period(Period::new(inherited_period.from(), upper)))
    }

    pub(crate) fn key_set_unlocked(
        &self,
        timestamp: Timestamp,
        keyspace: &str,
    ) -> Result<BTreeSet<String>> {
        let mut keys = match &self.origin {
            Some(origin) => {
                origin.key_set_unlocked(timestamp.min(self.branch.branching_timestamp()), keyspace)?
            }
            None => BTreeSet::new(),
        };
        if let Some(matrix) = self.context.backend.matrix(self.name(), keyspace)? {
            matrix.key_set_modifications(timestamp)?.apply_to(&mut keys);
        }
        Ok(keys)
    }

    pub(crate) fn keyspaces_unlocked(&self, timestamp: Timestamp) -> Result<BTreeSet<String>> {
        let mut keyspaces = match &self.origin {
            Some(origin) => {
                origin.keyspaces_unlocked(timestamp.min(self.branch.branching_timestamp()))?
            }
            None => BTreeSet::new(),
        };
        for matrix in self.context.backend.matrices(self.name())? {
            if matrix.creation_timestamp() <= timestamp {
                keyspaces.insert(matrix.keyspace().to_string());
            }
        }
        Ok(keyspaces)
    }

    pub(crate) fn history_unlocked(
        &self,
        timestamp: Timestamp,
        key: &QualifiedKey,
    ) -> Result<Vec<Timestamp>> {
        let mut history = match self.context.backend.matrix(self.name(), &key.keyspace)? {
            Some(matrix) => matrix.history(timestamp, &key.key)?,
            None => Vec::new(),
        };
        if let Some(origin) = &self.origin {
            let inherited =
                origin.history_unlocked(timestamp.min(self.branch.branching_timestamp()), key)?;
            history.extend(inherited);
        }
        Ok(history)
    }

    pub(crate) fn modifications_between_unlocked(
        &self,
        keyspace: &str,
        lower: Timestamp,
        upper: Timestamp,
    ) -> Result<Vec<TemporalKey>> {
        let mut modifications = Vec::new();
        if let Some(origin) = &self.origin {
            let branching = self.branch.branching_timestamp();
            if lower <= branching {
                modifications.extend(origin.modifications_between_unlocked(
                    keyspace,
                    lower,
                    upper.min(branching),
                )?);
            }
        }
        if let Some(matrix) = self.context.backend.matrix(self.name(), keyspace)? {
            modifications.extend(matrix.modifications_between(lower, upper)?);
        }
        modifications.sort();
        Ok(modifications)
    }

    /// Local entries of every keyspace up to `now`, for dumps
    pub(crate) fn entries_unlocked(&self) -> Result<BTreeMap<String, Vec<TemporalEntry>>> {
        let now = self.now();
        let mut entries = BTreeMap::new();
        for matrix in self.context.backend.matrices(self.name())? {
            entries.insert(matrix.keyspace().to_string(), matrix.entries(now)?);
        }
        Ok(entries)
    }

    // ---------------------------------------------------------------------
    // Commit path
    // ---------------------------------------------------------------------

    /// Commit `changes` on behalf of `tx`, opened at `tx_timestamp`
    ///
    /// When `tx` owns the incremental process this is its terminating step.
    pub fn commit(
        &self,
        tx: TransactionId,
        tx_timestamp: Timestamp,
        changes: &ChangeSet,
        metadata: Option<Vec<u8>>,
    ) -> Result<CommitInfo> {
        self.ensure_open()?;
        let _guard = self.locks.commit();
        let started = Instant::now();

        let process = self.incremental.owned_process(self.name(), tx)?;
        if changes.is_empty() && process.is_none() {
            return Ok(CommitInfo::empty());
        }

        let now = self.now();
        let timestamp = match process {
            Some(process) => process.timestamp,
            None => self.context.clock.next_after(now),
        };

        let plan = match self.plan_and_validate(changes, now, timestamp, tx_timestamp, process) {
            Ok(plan) => plan,
            Err(e) => return Err(self.fail_incremental_step(process, e)),
        };
        if plan.is_empty() && process.is_none() {
            debug!(
                branch = self.name(),
                skipped = plan.skipped,
                "Commit eliminated as duplicate"
            );
            return Ok(plan.info(None, false));
        }

        if process.is_none() {
            let token = WalToken::new(now, timestamp)?;
            self.context.wal.write(self.name(), &token)?;
        }

        let applied = self
            .apply_writes(timestamp, &plan, process.is_some(), now)
            .and_then(|()| self.finish_commit(timestamp, metadata))
            .and_then(|()| self.context.wal.clear(self.name()));

        match applied {
            Ok(()) => {
                self.incremental.terminate();
                observe::record_commit(started.elapsed(), plan.written);
                debug!(
                    branch = self.name(),
                    timestamp,
                    written = plan.written,
                    skipped = plan.skipped,
                    incremental = process.is_some(),
                    "Committed"
                );
                Ok(plan.info(Some(timestamp), false))
            }
            Err(e) => {
                warn!(
                    branch = self.name(),
                    timestamp,
                    error = %e,
                    "Commit failed, rolling back"
                );
                self.rollback_to(now, process.is_some());
                self.incremental.terminate();
                observe::record_commit_rollback();
                Err(ChronoError::commit_failed(e))
            }
        }
    }

    /// Stream `changes` into storage at the reserved timestamp of `tx`'s process
    pub fn commit_incremental(
        &self,
        tx: TransactionId,
        tx_timestamp: Timestamp,
        changes: &ChangeSet,
    ) -> Result<CommitInfo> {
        self.ensure_open()?;
        let _guard = self.locks.commit();

        let now = self.now();
        let clock = &self.context.clock;
        let (process, started) =
            self.incremental
                .begin_or_continue(self.name(), tx, now, || clock.next_after(now))?;

        if started {
            let token = WalToken::new(process.now_before, process.timestamp)
                .and_then(|token| self.context.wal.write(self.name(), &token));
            if let Err(e) = token {
                self.incremental.terminate();
                return Err(ChronoError::commit_failed(e));
            }
            debug!(
                branch = self.name(),
                timestamp = process.timestamp,
                tx = %tx,
                "Started incremental commit"
            );
        }

        let step = self
            .plan_and_validate(changes, now, process.timestamp, tx_timestamp, Some(process))
            .and_then(|plan| {
                self.apply_writes(process.timestamp, &plan, true, now)?;
                Ok(plan)
            });

        match step {
            Ok(plan) => {
                observe::record_incremental_commit();
                debug!(
                    branch = self.name(),
                    timestamp = process.timestamp,
                    written = plan.written,
                    "Applied incremental commit"
                );
                Ok(plan.info(Some(process.timestamp), true))
            }
            Err(e) => Err(self.fail_incremental_step(Some(process), e)),
        }
    }

    /// Discard every write of the process owned by `tx`
    ///
    /// No-op when no process is active.
    pub fn rollback_incremental(&self, tx: TransactionId) -> Result<()> {
        let _guard = self.locks.commit();
        match self.incremental.owned_process(self.name(), tx)? {
            Some(process) => {
                self.rollback_incremental_unlocked(process);
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub(crate) fn rollback_incremental_unlocked(&self, process: IncrementalProcess) {
        warn!(
            branch = self.name(),
            timestamp = process.timestamp,
            owner = %process.owner,
            "Rolling back incremental commit"
        );
        self.rollback_to(process.now_before, true);
        self.incremental.terminate();
    }

    /// Roll back the whole process after a failed step and wrap the error
    fn fail_incremental_step(
        &self,
        process: Option<IncrementalProcess>,
        error: ChronoError,
    ) -> ChronoError {
        match process {
            Some(process) => {
                self.rollback_incremental_unlocked(process);
                observe::record_commit_rollback();
                ChronoError::commit_failed(error)
            }
            None => error,
        }
    }

    /// Build the write plan and run the blind overwrite check
    fn plan_and_validate(
        &self,
        changes: &ChangeSet,
        now: Timestamp,
        timestamp: Timestamp,
        tx_timestamp: Timestamp,
        process: Option<IncrementalProcess>,
    ) -> Result<WritePlan> {
        let plan = self.plan_writes(changes, now, process.map(|_| timestamp))?;
        if self.context.config.blind_overwrite_protection {
            self.check_blind_overwrite(&plan, now, tx_timestamp)?;
        }
        Ok(plan)
    }

    /// Old values are read at `now`. Duplicates are detected against `now`,
    /// or against the reserved timestamp while an incremental process is
    /// open so that earlier increments count as the current value. A value
    /// that an earlier increment changed and this one sets back to the value
    /// at `now` is reverted rather than written again.
    fn plan_writes(
        &self,
        changes: &ChangeSet,
        now: Timestamp,
        reserved: Option<Timestamp>,
    ) -> Result<WritePlan> {
        let eliminate = self.context.config.duplicate_version_elimination
            == DuplicateVersionElimination::OnCommit;
        let mut plan = WritePlan::default();

        for entry in changes {
            let key = entry.key();
            let old = self.ranged_get_unlocked(now, key)?.into_value();
            let new = entry.value().cloned();

            if eliminate {
                let current = match reserved {
                    Some(reserved) => self.resolve_unlocked(reserved, key)?.into_value(),
                    None => old.clone(),
                };
                if current.as_deref() == new.as_deref() {
                    plan.skipped += 1;
                    continue;
                }
                if reserved.is_some() && old.as_deref() == new.as_deref() {
                    plan.reverted
                        .entry(key.keyspace.clone())
                        .or_default()
                        .insert(key.key.clone());
                    plan.skipped += 1;
                    continue;
                }
            }

            if !entry.has_option(PutOption::NoIndex) {
                plan.index_changes.push((
                    key.clone(),
                    IndexChange {
                        old,
                        new: new.clone(),
                    },
                ));
            }
            plan.writes
                .entry(key.keyspace.clone())
                .or_default()
                .insert(key.key.clone(), new);
            plan.written += 1;
        }
        Ok(plan)
    }

    fn check_blind_overwrite(
        &self,
        plan: &WritePlan,
        now: Timestamp,
        tx_timestamp: Timestamp,
    ) -> Result<()> {
        let mut conflicts = Vec::new();
        for (keyspace, contents) in &plan.writes {
            let Some(matrix) = self.context.backend.matrix(self.name(), keyspace)? else {
                continue;
            };
            for key in contents.keys() {
                let last = match matrix.last_commit_timestamp(key)? {
                    // Entries after `now` belong to the open incremental process
                    Some(last) if last > now => matrix.history(now, key)?.first().copied(),
                    other => other,
                };
                if matches!(last, Some(last) if last > tx_timestamp) {
                    conflicts.push(QualifiedKey::new(keyspace.clone(), key.clone()).to_string());
                }
            }
        }
        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(ChronoError::BlindOverwrite { keys: conflicts })
        }
    }

    /// Matrices, index and cache. Shared by full and incremental commits.
    fn apply_writes(
        &self,
        timestamp: Timestamp,
        plan: &WritePlan,
        incremental: bool,
        now: Timestamp,
    ) -> Result<()> {
        for (keyspace, contents) in &plan.writes {
            let matrix = match self.context.backend.matrix(self.name(), keyspace)? {
                Some(matrix) => matrix,
                None => self
                    .context
                    .backend
                    .create_matrix(self.name(), keyspace, timestamp)?,
            };
            matrix.put(timestamp, contents)?;
        }
        for (keyspace, keys) in &plan.reverted {
            if let Some(matrix) = self.context.backend.matrix(self.name(), keyspace)? {
                matrix.rollback_keys(now, keys)?;
            }
        }

        if let Some(index) = &self.context.index {
            if incremental {
                // Drop what earlier increments indexed for these keys
                let touched: BTreeSet<QualifiedKey> = plan.keys().collect();
                index.rollback(self.name(), now, Some(&touched))?;
            }
            let changes: BTreeMap<ChronoIdentifier, IndexChange> = plan
                .index_changes
                .iter()
                .map(|(key, change)| {
                    (
                        ChronoIdentifier::new(self.name(), timestamp, key),
                        change.clone(),
                    )
                })
                .collect();
            index.index(&changes)?;
            if incremental {
                index.clear_query_cache();
            }
        }

        if let Some(cache) = &self.cache {
            for key in plan.reverted_keys() {
                cache.invalidate(&key);
            }
            cache.write_through(timestamp, &plan.cache_values())?;
        }
        Ok(())
    }

    /// Commit metadata and the `now` watermark
    fn finish_commit(&self, timestamp: Timestamp, metadata: Option<Vec<u8>>) -> Result<()> {
        if let Some(metadata) = metadata {
            self.commit_metadata.put(timestamp, metadata)?;
        }
        self.context.backend.set_now(self.name(), timestamp)?;
        self.branch.set_now(timestamp);
        Ok(())
    }

    /// Restore the branch to `timestamp` after a failure. Best effort: every
    /// step runs even if an earlier one fails.
    fn rollback_to(&self, timestamp: Timestamp, clear_cache: bool) {
        let name = self.name();
        let result = (|| -> Result<()> {
            for matrix in self.context.backend.matrices(name)? {
                matrix.rollback(timestamp)?;
            }
            self.context
                .backend
                .drop_matrices_created_after(name, timestamp)?;
            Ok(())
        })();
        if let Err(e) = result {
            error!(branch = name, timestamp, error = %e, "Matrix rollback failed");
        }

        if let Err(e) = self.commit_metadata.rollback_to_timestamp(timestamp) {
            error!(branch = name, timestamp, error = %e, "Commit metadata rollback failed");
        }

        if let Some(index) = &self.context.index {
            if let Err(e) = index.rollback(name, timestamp, None) {
                error!(branch = name, timestamp, error = %e, "Index rollback failed");
            }
            index.clear_query_cache();
        }

        if let Some(cache) = &self.cache {
            if clear_cache {
                cache.clear();
            } else if let Err(e) = cache.rollback_to_timestamp(timestamp) {
                warn!(branch = name, error = %e, "Cache rollback failed, clearing");
                cache.clear();
            }
        }

        if let Err(e) = self.context.backend.set_now(name, timestamp) {
            error!(branch = name, timestamp, error = %e, "Failed to persist now");
        }
        self.branch.set_now(timestamp);

        if let Err(e) = self.context.wal.clear(name) {
            error!(branch = name, error = %e, "Failed to clear WAL token");
        }
    }

    // ---------------------------------------------------------------------
    // Recovery & maintenance
    // ---------------------------------------------------------------------

    /// Undo a commit interrupted by a crash, if a WAL token is present
    ///
    /// Returns whether a rollback was performed.
    pub(crate) fn recover(&self) -> Result<bool> {
        let _guard = self.locks.commit();
        let Some(token) = self.context.wal.read(self.name())? else {
            return Ok(false);
        };

        let before = token.now_before_commit();
        warn!(
            branch = self.name(),
            before,
            after = token.now_after_commit(),
            "Found WAL token, rolling back interrupted commit"
        );

        for matrix in self.context.backend.matrices(self.name())? {
            matrix.rollback(before)?;
        }
        self.context
            .backend
            .drop_matrices_created_after(self.name(), before)?;
        self.commit_metadata.rollback_to_timestamp(before)?;
        if let Some(index) = &self.context.index {
            index.rollback(self.name(), before, None)?;
            index.clear_query_cache();
        }
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        self.context.backend.set_now(self.name(), before)?;
        self.branch.set_now(before);
        self.context.wal.clear(self.name())?;

        observe::record_recovery();
        info!(branch = self.name(), now = before, "Recovered branch");
        Ok(true)
    }

    /// Rebuild this branch's index entries from matrix history
    ///
    /// Holds the exclusive branch lock: readers wait until the rebuild is
    /// complete. Returns the number of indexed versions.
    pub fn reindex(&self) -> Result<usize> {
        self.ensure_open()?;
        let Some(index) = &self.context.index else {
            return Ok(0);
        };
        let _guard = self.locks.exclusive();

        index.drop_branch(self.name())?;
        let now = self.now();
        let branching = self.branch.branching_timestamp();
        let mut changes = BTreeMap::new();

        for matrix in self.context.backend.matrices(self.name())? {
            let mut previous: HashMap<String, Option<Value>> = HashMap::new();
            for entry in matrix.entries(now)? {
                let key = QualifiedKey::new(matrix.keyspace(), entry.key.clone());
                let old = match previous.get(&entry.key) {
                    Some(value) => value.clone(),
                    None => match &self.origin {
                        Some(origin) => origin.ranged_get_unlocked(branching, &key)?.into_value(),
                        None => None,
                    },
                };
                previous.insert(entry.key.clone(), entry.value.clone());
                changes.insert(
                    ChronoIdentifier::new(self.name(), entry.timestamp, &key),
                    IndexChange {
                        old,
                        new: entry.value,
                    },
                );
            }
        }

        index.index(&changes)?;
        index.clear_query_cache();
        info!(branch = self.name(), versions = changes.len(), "Reindexed branch");
        Ok(changes.len())
    }
}

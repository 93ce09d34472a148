//! Client-facing transactions
//!
//! A [`Transaction`] reads a branch at a fixed timestamp and accumulates
//! writes in a [`ChangeSet`] until `commit()`. Reads see the transaction's
//! own pending writes first.
//!
//! # Example
//!
//! ```
//! use chronokv::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let db = ChronoDb::in_memory()?;
//!
//! let mut tx = db.tx()?;
//! tx.put("greeting", &"hello")?;
//! tx.put_in("counters", "visits", &1u64)?;
//! let info = tx.commit()?;
//! assert_eq!(info.entries_written, 2);
//!
//! let tx = db.read_only_tx()?;
//! assert_eq!(tx.get::<String>("greeting")?.as_deref(), Some("hello"));
//! # Ok(())
//! # }
//! ```

use crate::change_set::{ChangeSet, ChangeSetEntry};
use crate::codec::{Codec, SerializationManager};
use crate::store::TemporalKeyValueStore;
use chronokv_core::{
    ChronoError, CommitInfo, Period, PutOption, QualifiedKey, RangedGetResult, Result,
    TemporalKey, Timestamp, TransactionId, Value,
};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

/// Keyspace used by the methods without an explicit keyspace argument
pub const DEFAULT_KEYSPACE: &str = "default";

pub struct Transaction {
    id: TransactionId,
    store: Arc<TemporalKeyValueStore>,
    timestamp: Timestamp,
    read_only: bool,
    closed: bool,
    codec: Codec,
    changes: ChangeSet,
}

impl Transaction {
    pub(crate) fn new(
        store: Arc<TemporalKeyValueStore>,
        timestamp: Timestamp,
        read_only: bool,
        codec: Codec,
    ) -> Self {
        Self {
            id: TransactionId::next(),
            store,
            timestamp,
            read_only,
            closed: false,
            codec,
            changes: ChangeSet::new(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn branch(&self) -> &str {
        self.store.name()
    }

    /// Timestamp this transaction reads at
    ///
    /// Advances to the commit timestamp after each successful commit.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Pending, uncommitted changes
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Whether this transaction owns the branch's incremental commit process
    pub fn is_incremental(&self) -> bool {
        self.store.incremental().is_owned_by(self.id)
    }

    // The owner of an incremental process reads its own streamed writes.
    fn read_timestamp(&self) -> Timestamp {
        match self.store.incremental().current() {
            Some(process) if process.owner == self.id => process.timestamp,
            _ => self.timestamp,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(ChronoError::TransactionClosed(self.id.to_string()));
        }
        Ok(())
    }

    fn ensure_writable(&self, operation: &'static str) -> Result<()> {
        self.ensure_open()?;
        if self.read_only {
            return Err(ChronoError::ReadOnlyTransaction(operation));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get_in(DEFAULT_KEYSPACE, key)
    }

    pub fn get_in<T: DeserializeOwned>(&self, keyspace: &str, key: &str) -> Result<Option<T>> {
        match self.get_bytes_in(keyspace, key)? {
            Some(bytes) => Ok(Some(self.codec.deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_bytes_in(&self, keyspace: &str, key: &str) -> Result<Option<Value>> {
        Ok(self.get_ranged(keyspace, key)?.into_value())
    }

    /// Value of `key` with the period in which it is valid
    ///
    /// A pending write is reported as valid from the transaction timestamp on.
    pub fn get_ranged(&self, keyspace: &str, key: &str) -> Result<RangedGetResult> {
        self.ensure_open()?;
        let key = QualifiedKey::new(keyspace, key);
        if let Some(entry) = self.changes.get(&key) {
            return Ok(RangedGetResult::hit(
                key,
                entry.value().cloned(),
                Period::open_ended(self.timestamp),
            ));
        }
        self.store.ranged_get(self.read_timestamp(), &key)
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        self.exists_in(DEFAULT_KEYSPACE, key)
    }

    pub fn exists_in(&self, keyspace: &str, key: &str) -> Result<bool> {
        Ok(self.get_bytes_in(keyspace, key)?.is_some())
    }

    /// Keys with a value in `keyspace`, pending changes applied
    pub fn key_set(&self, keyspace: &str) -> Result<BTreeSet<String>> {
        self.ensure_open()?;
        let mut keys = self.store.key_set(self.read_timestamp(), keyspace)?;
        for entry in self.changes.in_keyspace(keyspace) {
            if entry.is_removal() {
                keys.remove(&entry.key().key);
            } else {
                keys.insert(entry.key().key.clone());
            }
        }
        Ok(keys)
    }

    pub fn keyspaces(&self) -> Result<BTreeSet<String>> {
        self.ensure_open()?;
        let mut keyspaces = self.store.keyspaces(self.read_timestamp())?;
        keyspaces.extend(self.changes.keyspaces_with_values());
        Ok(keyspaces)
    }

    /// Commit timestamps that modified `key`, newest first
    pub fn history(&self, keyspace: &str, key: &str) -> Result<Vec<Timestamp>> {
        self.ensure_open()?;
        self.store
            .history(self.read_timestamp(), &QualifiedKey::new(keyspace, key))
    }

    pub fn modifications_between(
        &self,
        keyspace: &str,
        lower: Timestamp,
        upper: Timestamp,
    ) -> Result<Vec<TemporalKey>> {
        self.ensure_open()?;
        let read_timestamp = self.read_timestamp();
        if upper > read_timestamp {
            return Err(ChronoError::InvalidTimestamp(format!(
                "upper bound {} is after the transaction timestamp {}",
                upper, read_timestamp
            )));
        }
        self.store.modifications_between(keyspace, lower, upper)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    pub fn put<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        self.put_in(DEFAULT_KEYSPACE, key, value)
    }

    pub fn put_in<T: Serialize + ?Sized>(
        &mut self,
        keyspace: &str,
        key: &str,
        value: &T,
    ) -> Result<()> {
        self.put_with_options(keyspace, key, value, &[])
    }

    pub fn put_with_options<T: Serialize + ?Sized>(
        &mut self,
        keyspace: &str,
        key: &str,
        value: &T,
        options: &[PutOption],
    ) -> Result<()> {
        self.ensure_writable("put")?;
        let bytes = self.codec.serialize(value)?;
        self.stage(keyspace, key, Some(Value::from(bytes)), options)
    }

    /// Store raw bytes, bypassing the codec
    pub fn put_bytes_in(&mut self, keyspace: &str, key: &str, value: &[u8]) -> Result<()> {
        self.ensure_writable("put")?;
        self.stage(keyspace, key, Some(Value::from(value)), &[])
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        self.remove_in(DEFAULT_KEYSPACE, key)
    }

    pub fn remove_in(&mut self, keyspace: &str, key: &str) -> Result<()> {
        self.ensure_writable("remove")?;
        self.stage(keyspace, key, None, &[])
    }

    fn stage(
        &mut self,
        keyspace: &str,
        key: &str,
        value: Option<Value>,
        options: &[PutOption],
    ) -> Result<()> {
        if keyspace.is_empty() || key.is_empty() {
            return Err(ChronoError::InvalidState(
                "keyspace and key must not be empty".into(),
            ));
        }
        self.changes.insert(ChangeSetEntry::new(
            QualifiedKey::new(keyspace, key),
            value,
            options.iter().copied().collect(),
        ));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Commit & rollback
    // ------------------------------------------------------------------

    pub fn commit(&mut self) -> Result<CommitInfo> {
        self.commit_inner(None)
    }

    /// Commit and store `metadata` at the commit timestamp
    pub fn commit_with_metadata<M: Serialize + ?Sized>(
        &mut self,
        metadata: &M,
    ) -> Result<CommitInfo> {
        self.ensure_writable("commit")?;
        let bytes = self.codec.serialize(metadata)?;
        self.commit_inner(Some(bytes))
    }

    fn commit_inner(&mut self, metadata: Option<Vec<u8>>) -> Result<CommitInfo> {
        self.ensure_writable("commit")?;
        let changes = std::mem::take(&mut self.changes);
        match self.store.commit(self.id, self.timestamp, &changes, metadata) {
            Ok(info) => {
                if let Some(timestamp) = info.timestamp {
                    self.timestamp = timestamp;
                }
                Ok(info)
            }
            Err(e) => {
                // Rejected before any write: keep the changes for a retry
                if !e.is_commit_failure() {
                    self.changes = changes;
                }
                Err(e)
            }
        }
    }

    /// Stream the pending changes into storage without making them visible
    ///
    /// All increments share one reserved timestamp. They become visible with
    /// the final `commit()` or are discarded by `rollback()`.
    pub fn commit_incremental(&mut self) -> Result<CommitInfo> {
        self.ensure_writable("commit")?;
        let changes = std::mem::take(&mut self.changes);
        match self.store.commit_incremental(self.id, self.timestamp, &changes) {
            Ok(info) => Ok(info),
            Err(e) => {
                if !e.is_commit_failure() {
                    self.changes = changes;
                }
                Err(e)
            }
        }
    }

    /// Discard pending changes and any incremental process this transaction
    /// owns, then close the transaction
    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.changes.clear();
        self.closed = true;
        if self.is_incremental() {
            self.store.rollback_incremental(self.id)?;
        }
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.is_incremental() {
            warn!(
                tx = %self.id,
                branch = self.store.name(),
                "Transaction dropped during incremental commit, rolling back"
            );
            if let Err(e) = self.store.rollback_incremental(self.id) {
                warn!(tx = %self.id, error = %e, "Incremental rollback on drop failed");
            }
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("branch", &self.store.name())
            .field("timestamp", &self.timestamp)
            .field("read_only", &self.read_only)
            .field("pending", &self.changes.len())
            .finish()
    }
}

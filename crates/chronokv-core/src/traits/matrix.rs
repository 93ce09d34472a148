use crate::error::Result;
use crate::types::{
    KeySetModifications, RangedGetResult, TemporalEntry, TemporalKey, Timestamp, Value,
};
use std::collections::{BTreeMap, BTreeSet};

/// Versioned key/value storage for one keyspace of one branch
///
/// Every entry is addressed by `(key, timestamp)`. An entry with no value is
/// a deletion marker. Matrices never see branch inheritance; delegation to
/// the origin branch is done by the store on a local miss.
pub trait TemporalDataMatrix: Send + Sync {
    fn branch(&self) -> &str;

    fn keyspace(&self) -> &str;

    /// Timestamp at which the keyspace came into existence on this branch
    fn creation_timestamp(&self) -> Timestamp;

    /// Point-in-time read
    ///
    /// Returns a hit with period `[entry_ts, next_entry_ts)` if an entry
    /// exists at or before `timestamp`, otherwise a miss whose period ends at
    /// the first entry for the key (or infinity).
    fn get(&self, timestamp: Timestamp, key: &str) -> Result<RangedGetResult>;

    /// Write all `contents` at `timestamp`. `None` values are deletions.
    fn put(&self, timestamp: Timestamp, contents: &BTreeMap<String, Option<Value>>) -> Result<()>;

    /// Timestamps at which `key` was modified, up to `max_timestamp`, newest first
    fn history(&self, max_timestamp: Timestamp, key: &str) -> Result<Vec<Timestamp>>;

    /// All modifications with `lower <= timestamp <= upper`, ordered by timestamp
    fn modifications_between(&self, lower: Timestamp, upper: Timestamp)
        -> Result<Vec<TemporalKey>>;

    /// Bulk load raw entries, bypassing change detection
    fn insert_entries(&self, entries: Vec<TemporalEntry>) -> Result<()>;

    /// Drop every entry with a timestamp greater than `timestamp`
    fn rollback(&self, timestamp: Timestamp) -> Result<()>;

    /// Drop entries of `keys` with a timestamp greater than `timestamp`
    fn rollback_keys(&self, timestamp: Timestamp, keys: &BTreeSet<String>) -> Result<()>;

    /// Timestamp of the newest entry for `key`, regardless of any read timestamp
    fn last_commit_timestamp(&self, key: &str) -> Result<Option<Timestamp>>;

    /// Keys whose latest entry at `timestamp` is a value (additions) or a deletion (removals)
    fn key_set_modifications(&self, timestamp: Timestamp) -> Result<KeySetModifications>;

    /// Every entry up to `max_timestamp`, ordered by timestamp then key
    fn entries(&self, max_timestamp: Timestamp) -> Result<Vec<TemporalEntry>>;
}

/// Opaque commit metadata per commit timestamp of one branch
pub trait CommitMetadataStore: Send + Sync {
    fn put(&self, timestamp: Timestamp, metadata: Vec<u8>) -> Result<()>;

    fn get(&self, timestamp: Timestamp) -> Result<Option<Vec<u8>>>;

    /// Drop metadata of every commit after `timestamp`
    fn rollback_to_timestamp(&self, timestamp: Timestamp) -> Result<()>;

    /// Commit timestamps carrying metadata with `lower <= ts <= upper`, ascending
    fn timestamps_between(&self, lower: Timestamp, upper: Timestamp) -> Result<Vec<Timestamp>>;
}

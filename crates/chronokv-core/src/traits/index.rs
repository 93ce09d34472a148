use crate::error::Result;
use crate::types::{ChronoIdentifier, IndexChange, QualifiedKey, Timestamp};
use std::collections::{BTreeMap, BTreeSet};

/// Secondary index fed by commits
///
/// The store calls `index` with old/new value pairs after matrix writes, and
/// `rollback` whenever the branch is rolled back. Query execution is owned by
/// the implementation.
pub trait IndexManager: Send + Sync {
    fn index(&self, changes: &BTreeMap<ChronoIdentifier, IndexChange>) -> Result<()>;

    /// Undo index state of `branch` after `timestamp`, optionally restricted to `keys`
    fn rollback(
        &self,
        branch: &str,
        timestamp: Timestamp,
        keys: Option<&BTreeSet<QualifiedKey>>,
    ) -> Result<()>;

    /// Drop every index entry of `branch`
    fn drop_branch(&self, branch: &str) -> Result<()>;

    fn clear_query_cache(&self);
}

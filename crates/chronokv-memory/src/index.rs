//! Secondary index held in memory
//!
//! Indexers are named functions that extract index values from stored
//! bytes. Each (branch, index, value, key) association carries its own
//! validity window `[valid_from, valid_to)`, so queries can be answered at
//! any timestamp. Queries only see the given branch's own index entries.

use chronokv_core::{
    ChronoIdentifier, IndexChange, IndexManager, QualifiedKey, Result, Timestamp,
    TIMESTAMP_INFINITY,
};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Extracts index values from a stored value
pub type Indexer = Arc<dyn Fn(&[u8]) -> Vec<String> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct IndexEntry {
    branch: String,
    index: String,
    value: String,
    key: QualifiedKey,
    valid_from: Timestamp,
    valid_to: Timestamp,
}

impl IndexEntry {
    fn matches(&self, branch: &str, keys: Option<&BTreeSet<QualifiedKey>>) -> bool {
        self.branch == branch && keys.map_or(true, |keys| keys.contains(&self.key))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QueryKey {
    branch: String,
    timestamp: Timestamp,
    index: String,
    value: String,
}

#[derive(Default)]
pub struct InMemoryIndexManager {
    indexers: RwLock<BTreeMap<String, Indexer>>,
    entries: RwLock<Vec<IndexEntry>>,
    query_cache: DashMap<QueryKey, Vec<QualifiedKey>>,
}

impl InMemoryIndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an indexer. Existing data is not indexed retroactively;
    /// reindex the branch for that.
    pub fn register_indexer<F>(&self, name: impl Into<String>, indexer: F)
    where
        F: Fn(&[u8]) -> Vec<String> + Send + Sync + 'static,
    {
        self.indexers.write().insert(name.into(), Arc::new(indexer));
        self.query_cache.clear();
    }

    pub fn index_names(&self) -> Vec<String> {
        self.indexers.read().keys().cloned().collect()
    }

    /// Keys of `branch` whose value had `value` in `index` at `timestamp`
    pub fn find(
        &self,
        branch: &str,
        timestamp: Timestamp,
        index: &str,
        value: &str,
    ) -> Vec<QualifiedKey> {
        let query = QueryKey {
            branch: branch.to_string(),
            timestamp,
            index: index.to_string(),
            value: value.to_string(),
        };
        if let Some(cached) = self.query_cache.get(&query) {
            return cached.clone();
        }

        let result: BTreeSet<QualifiedKey> = self
            .entries
            .read()
            .iter()
            .filter(|e| {
                e.branch == branch
                    && e.index == index
                    && e.value == value
                    && e.valid_from <= timestamp
                    && timestamp < e.valid_to
            })
            .map(|e| e.key.clone())
            .collect();
        let result: Vec<QualifiedKey> = result.into_iter().collect();
        self.query_cache.insert(query, result.clone());
        result
    }

    /// Cached query results (for diagnostics)
    pub fn query_cache_size(&self) -> usize {
        self.query_cache.len()
    }

    fn extract(indexer: &Indexer, value: Option<&[u8]>) -> BTreeSet<String> {
        value
            .map(|bytes| indexer(bytes).into_iter().collect())
            .unwrap_or_default()
    }
}

impl IndexManager for InMemoryIndexManager {
    fn index(&self, changes: &BTreeMap<ChronoIdentifier, IndexChange>) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let indexers = self.indexers.read();
        let mut entries = self.entries.write();

        for (id, change) in changes {
            let key = id.qualified_key();
            for (name, indexer) in indexers.iter() {
                let old = Self::extract(indexer, change.old.as_deref());
                let new = Self::extract(indexer, change.new.as_deref());

                for removed in old.difference(&new) {
                    for entry in entries.iter_mut().filter(|e| {
                        e.branch == id.branch()
                            && e.index == *name
                            && e.value == *removed
                            && e.key == key
                            && e.valid_to == TIMESTAMP_INFINITY
                    }) {
                        entry.valid_to = id.timestamp();
                    }
                }
                for added in new.difference(&old) {
                    entries.push(IndexEntry {
                        branch: id.branch().to_string(),
                        index: name.clone(),
                        value: added.clone(),
                        key: key.clone(),
                        valid_from: id.timestamp(),
                        valid_to: TIMESTAMP_INFINITY,
                    });
                }
            }
        }
        drop(entries);
        self.query_cache.clear();
        tracing::trace!(changes = changes.len(), "Indexed changes");
        Ok(())
    }

    fn rollback(
        &self,
        branch: &str,
        timestamp: Timestamp,
        keys: Option<&BTreeSet<QualifiedKey>>,
    ) -> Result<()> {
        let mut entries = self.entries.write();
        entries.retain(|e| !(e.matches(branch, keys) && e.valid_from > timestamp));
        for entry in entries.iter_mut() {
            if entry.matches(branch, keys)
                && entry.valid_to > timestamp
                && entry.valid_to != TIMESTAMP_INFINITY
            {
                entry.valid_to = TIMESTAMP_INFINITY;
            }
        }
        drop(entries);
        self.query_cache.clear();
        Ok(())
    }

    fn drop_branch(&self, branch: &str) -> Result<()> {
        self.entries.write().retain(|e| e.branch != branch);
        self.query_cache.clear();
        Ok(())
    }

    fn clear_query_cache(&self) {
        self.query_cache.clear();
    }
}

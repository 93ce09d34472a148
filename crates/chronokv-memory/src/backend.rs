use crate::commit_metadata::InMemoryCommitMetadataStore;
use crate::matrix::InMemoryMatrix;
use chronokv_core::{
    BranchMetadata, CommitMetadataStore, FormatVersion, Result, StorageBackend,
    TemporalDataMatrix, Timestamp, WalToken, WalTokenStore,
};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// WAL token slots kept in memory
#[derive(Default)]
pub struct InMemoryWalTokenStore {
    tokens: DashMap<String, WalToken>,
}

impl InMemoryWalTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WalTokenStore for InMemoryWalTokenStore {
    fn read(&self, branch: &str) -> Result<Option<WalToken>> {
        Ok(self.tokens.get(branch).map(|t| t.value().clone()))
    }

    fn write(&self, branch: &str, token: &WalToken) -> Result<()> {
        self.tokens.insert(branch.to_string(), token.clone());
        Ok(())
    }

    fn clear(&self, branch: &str) -> Result<()> {
        self.tokens.remove(branch);
        Ok(())
    }
}

struct Inner {
    /// (branch, keyspace) -> matrix
    matrices: RwLock<BTreeMap<(String, String), Arc<InMemoryMatrix>>>,
    commit_metadata: DashMap<String, Arc<InMemoryCommitMetadataStore>>,
    wal_tokens: Arc<dyn WalTokenStore>,
    branches: RwLock<Vec<BranchMetadata>>,
    now: DashMap<String, Timestamp>,
    format_version: RwLock<Option<FormatVersion>>,
}

/// Storage backend held entirely in process memory
///
/// Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct InMemoryBackend {
    inner: Arc<Inner>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::with_wal_store(Arc::new(InMemoryWalTokenStore::new()))
    }

    /// Backend whose WAL tokens live in `wal_tokens` (e.g. a file-backed store)
    pub fn with_wal_store(wal_tokens: Arc<dyn WalTokenStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                matrices: RwLock::new(BTreeMap::new()),
                commit_metadata: DashMap::new(),
                wal_tokens,
                branches: RwLock::new(Vec::new()),
                now: DashMap::new(),
                format_version: RwLock::new(None),
            }),
        }
    }

    /// Total number of stored entries across all matrices of `branch`
    pub fn entry_count(&self, branch: &str) -> usize {
        self.inner
            .matrices
            .read()
            .iter()
            .filter(|((b, _), _)| b == branch)
            .map(|(_, m)| m.len())
            .sum()
    }
}

impl StorageBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn matrix(&self, branch: &str, keyspace: &str) -> Result<Option<Arc<dyn TemporalDataMatrix>>> {
        Ok(self
            .inner
            .matrices
            .read()
            .get(&(branch.to_string(), keyspace.to_string()))
            .map(|m| m.clone() as Arc<dyn TemporalDataMatrix>))
    }

    fn create_matrix(
        &self,
        branch: &str,
        keyspace: &str,
        creation_timestamp: Timestamp,
    ) -> Result<Arc<dyn TemporalDataMatrix>> {
        let mut matrices = self.inner.matrices.write();
        let matrix = matrices
            .entry((branch.to_string(), keyspace.to_string()))
            .or_insert_with(|| {
                tracing::debug!(branch, keyspace, creation_timestamp, "Creating matrix");
                Arc::new(InMemoryMatrix::new(branch, keyspace, creation_timestamp))
            });
        Ok(matrix.clone() as Arc<dyn TemporalDataMatrix>)
    }

    fn matrices(&self, branch: &str) -> Result<Vec<Arc<dyn TemporalDataMatrix>>> {
        Ok(self
            .inner
            .matrices
            .read()
            .iter()
            .filter(|((b, _), _)| b == branch)
            .map(|(_, m)| m.clone() as Arc<dyn TemporalDataMatrix>)
            .collect())
    }

    fn drop_matrices_created_after(
        &self,
        branch: &str,
        timestamp: Timestamp,
    ) -> Result<Vec<String>> {
        let mut matrices = self.inner.matrices.write();
        let doomed: Vec<(String, String)> = matrices
            .iter()
            .filter(|((b, _), m)| b == branch && m.creation_timestamp() > timestamp)
            .map(|(k, _)| k.clone())
            .collect();
        let mut dropped = Vec::with_capacity(doomed.len());
        for key in doomed {
            matrices.remove(&key);
            dropped.push(key.1);
        }
        if !dropped.is_empty() {
            tracing::debug!(branch, timestamp, ?dropped, "Dropped matrices");
        }
        Ok(dropped)
    }

    fn commit_metadata_store(&self, branch: &str) -> Result<Arc<dyn CommitMetadataStore>> {
        let store = self
            .inner
            .commit_metadata
            .entry(branch.to_string())
            .or_insert_with(|| Arc::new(InMemoryCommitMetadataStore::new()))
            .clone();
        Ok(store as Arc<dyn CommitMetadataStore>)
    }

    fn wal_tokens(&self) -> Arc<dyn WalTokenStore> {
        self.inner.wal_tokens.clone()
    }

    fn load_branches(&self) -> Result<Vec<BranchMetadata>> {
        Ok(self.inner.branches.read().clone())
    }

    fn save_branch(&self, metadata: &BranchMetadata) -> Result<()> {
        let mut branches = self.inner.branches.write();
        match branches.iter_mut().find(|b| b.name == metadata.name) {
            Some(existing) => *existing = metadata.clone(),
            None => branches.push(metadata.clone()),
        }
        Ok(())
    }

    fn now(&self, branch: &str) -> Result<Option<Timestamp>> {
        Ok(self.inner.now.get(branch).map(|n| *n))
    }

    fn set_now(&self, branch: &str, timestamp: Timestamp) -> Result<()> {
        self.inner.now.insert(branch.to_string(), timestamp);
        Ok(())
    }

    fn format_version(&self) -> Result<Option<FormatVersion>> {
        Ok(*self.inner.format_version.read())
    }

    fn set_format_version(&self, version: FormatVersion) -> Result<()> {
        *self.inner.format_version.write() = Some(version);
        Ok(())
    }
}

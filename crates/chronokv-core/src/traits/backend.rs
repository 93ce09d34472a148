use crate::error::Result;
use crate::traits::matrix::{CommitMetadataStore, TemporalDataMatrix};
use crate::types::{BranchMetadata, FormatVersion, Timestamp, WalToken};
use std::sync::Arc;

/// Durable per-branch WAL token slots
///
/// `write` must be durable before it returns: the token's presence is the
/// only signal that a commit was interrupted.
pub trait WalTokenStore: Send + Sync {
    fn read(&self, branch: &str) -> Result<Option<WalToken>>;

    fn write(&self, branch: &str, token: &WalToken) -> Result<()>;

    /// Remove the token. Clearing an absent token is not an error.
    fn clear(&self, branch: &str) -> Result<()>;
}

/// Physical storage behind a database
///
/// Owns matrices, commit metadata, WAL tokens and the branch catalog.
pub trait StorageBackend: Send + Sync {
    /// Backend type (e.g., "memory")
    fn name(&self) -> &'static str;

    fn matrix(&self, branch: &str, keyspace: &str) -> Result<Option<Arc<dyn TemporalDataMatrix>>>;

    /// Create the matrix, or return the existing one unchanged
    fn create_matrix(
        &self,
        branch: &str,
        keyspace: &str,
        creation_timestamp: Timestamp,
    ) -> Result<Arc<dyn TemporalDataMatrix>>;

    /// All matrices of `branch`, ordered by keyspace
    fn matrices(&self, branch: &str) -> Result<Vec<Arc<dyn TemporalDataMatrix>>>;

    /// Remove matrices created after `timestamp`; returns their keyspaces
    fn drop_matrices_created_after(&self, branch: &str, timestamp: Timestamp)
        -> Result<Vec<String>>;

    fn commit_metadata_store(&self, branch: &str) -> Result<Arc<dyn CommitMetadataStore>>;

    fn wal_tokens(&self) -> Arc<dyn WalTokenStore>;

    /// Persisted branches in creation order
    fn load_branches(&self) -> Result<Vec<BranchMetadata>>;

    fn save_branch(&self, metadata: &BranchMetadata) -> Result<()>;

    /// Persisted `now` watermark of `branch`
    fn now(&self, branch: &str) -> Result<Option<Timestamp>>;

    fn set_now(&self, branch: &str, timestamp: Timestamp) -> Result<()>;

    fn format_version(&self) -> Result<Option<FormatVersion>>;

    fn set_format_version(&self, version: FormatVersion) -> Result<()>;
}

//! ChronoKV Core: traits and types for the temporal key-value store
//!
//! This crate defines the abstractions shared by every ChronoKV component:
//! - Temporal data matrices: versioned key/value storage per (branch, keyspace)
//! - Commit metadata stores, read caches and secondary index managers
//! - Storage backends and durable write-ahead-log (WAL) token stores
//! - The lock hierarchy (database -> branch -> commit) as scoped guards
//! - A monotonic commit clock
//!
//! Key properties:
//! - Every write is versioned by its commit timestamp
//! - Branches fork from a parent at a branching timestamp
//! - Readers are never blocked by ordinary commits

pub mod clock;
pub mod config;
pub mod error;
pub mod locking;
pub mod observe;
pub mod traits;
pub mod types;

pub use clock::CommitClock;
pub use config::{ChronoConfig, CodecKind, DuplicateVersionElimination, EvictionPolicy};
pub use error::{ChronoError, Result};
pub use locking::{BranchGuard, BranchLocks, CommitGuard, DatabaseGuard, DatabaseLock};
pub use traits::{
    CacheLookup, CommitMetadataStore, IndexManager, StorageBackend, TemporalCache,
    TemporalDataMatrix, WalTokenStore,
};
pub use types::{
    BranchMetadata, ChronoIdentifier, CommitInfo, FormatVersion, IndexChange,
    KeySetModifications, Period, PutOption, QualifiedKey, RangedGetResult, TemporalEntry,
    TemporalKey, Timestamp, TransactionId, Value, WalToken, MASTER_BRANCH_NAME,
    TIMESTAMP_INFINITY,
};

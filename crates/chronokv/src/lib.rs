//! ChronoKV: a temporal, branch-aware key-value database
//!
//! Every write is versioned by its commit timestamp, so any past state of a
//! branch can be read back. Branches fork from a parent at a branching
//! timestamp and inherit everything the parent held at that point.
//!
//! - **Transactions**: accumulate writes and commit them atomically at one
//!   timestamp, with optional blind-overwrite protection
//! - **Incremental commits**: stream very large change sets at a reserved
//!   timestamp, invisible to readers until the final commit
//! - **Crash recovery**: a per-branch WAL token rolls back interrupted commits
//!   on the next open
//!
//! # Quick Start
//!
//! ```
//! use chronokv::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let db = ChronoDb::in_memory()?;
//!
//! let mut tx = db.tx()?;
//! tx.put("rate", &1.5f64)?;
//! let first = tx.commit()?.timestamp.unwrap();
//!
//! tx.put("rate", &2.25f64)?;
//! tx.commit()?;
//!
//! // Fork a branch and read the past
//! db.create_branch("experiment")?;
//! let old = db.read_only_tx_at(MASTER_BRANCH_NAME, first)?;
//! assert_eq!(old.get::<f64>("rate")?, Some(1.5));
//! # Ok(())
//! # }
//! ```

pub mod branch;
pub mod change_set;
pub mod codec;
pub mod db;
pub mod incremental;
pub mod prelude;
pub mod store;
pub mod transaction;
pub mod wal_file;

// Re-export core types
pub use chronokv_core::{
    BranchMetadata, CacheLookup, ChronoConfig, ChronoError, ChronoIdentifier, CodecKind,
    CommitClock, CommitInfo, CommitMetadataStore, DuplicateVersionElimination, EvictionPolicy,
    FormatVersion, IndexChange, IndexManager, KeySetModifications, Period, PutOption,
    QualifiedKey, RangedGetResult, Result, StorageBackend, TemporalCache, TemporalDataMatrix,
    TemporalEntry, TemporalKey, Timestamp, TransactionId, Value, WalToken, WalTokenStore,
    MASTER_BRANCH_NAME, TIMESTAMP_INFINITY,
};

// Re-export implementations
pub use chronokv_memory::{
    InMemoryBackend, InMemoryIndexManager, InMemoryTemporalCache, InMemoryWalTokenStore,
};

// Re-export main types from this crate
pub use branch::{Branch, BranchManager};
pub use change_set::{ChangeSet, ChangeSetEntry};
pub use codec::{Codec, JsonCodec, MsgPackCodec, SerializationManager};
pub use db::{ChronoDb, ChronoDbBuilder, ExclusiveAccess};
pub use incremental::{IncrementalCommitState, IncrementalProcess};
pub use store::TemporalKeyValueStore;
pub use transaction::{Transaction, DEFAULT_KEYSPACE};
pub use wal_file::FileWalTokenStore;

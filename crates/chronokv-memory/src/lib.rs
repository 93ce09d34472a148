//! In-memory implementations of the ChronoKV collaborator traits
//!
//! - [`InMemoryBackend`]: matrices, commit metadata, WAL token slots and the
//!   branch catalog, all held in process memory. Clones share state, which
//!   lets a backend outlive one database instance (useful to simulate a
//!   restart).
//! - [`InMemoryTemporalCache`]: bounded ranged-read cache with FIFO or LRU
//!   eviction.
//! - [`InMemoryIndexManager`]: secondary index over named indexer functions.

pub mod backend;
pub mod cache;
pub mod commit_metadata;
pub mod index;
pub mod matrix;

pub use backend::{InMemoryBackend, InMemoryWalTokenStore};
pub use cache::{CacheStats, InMemoryTemporalCache};
pub use commit_metadata::InMemoryCommitMetadataStore;
pub use index::{InMemoryIndexManager, Indexer};
pub use matrix::InMemoryMatrix;

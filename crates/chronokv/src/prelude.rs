//! ChronoKV Prelude
//!
//! Import this to get all commonly used types and traits:
//!
//! ```
//! use chronokv::prelude::*;
//! ```

// Core types
pub use crate::{
    ChronoError, CommitInfo, Period, PutOption, QualifiedKey, RangedGetResult, Result,
    TemporalKey, Timestamp, MASTER_BRANCH_NAME,
};

// Configs
pub use crate::{ChronoConfig, CodecKind, DuplicateVersionElimination, EvictionPolicy};

// Database & transactions
pub use crate::{Branch, ChronoDb, ChronoDbBuilder, CommitClock, Transaction, DEFAULT_KEYSPACE};

// Traits
pub use crate::{IndexManager, SerializationManager, StorageBackend, WalTokenStore};

// Implementations
pub use crate::{FileWalTokenStore, InMemoryBackend, InMemoryIndexManager};

// Re-export common external deps
pub use serde::{Deserialize, Serialize};
pub use std::sync::Arc;

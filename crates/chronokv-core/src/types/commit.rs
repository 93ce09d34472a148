use crate::types::key::Value;
use crate::types::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Allocate a fresh identifier.
    pub fn next() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// Per-entry options attached to a change-set entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PutOption {
    /// Do not feed this entry to the secondary index
    NoIndex,
}

/// Old/new value pair handed to the index manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexChange {
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// Information about a commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Commit timestamp (`None` if nothing was written)
    pub timestamp: Option<Timestamp>,

    /// Number of entries physically written
    pub entries_written: usize,

    /// Number of entries dropped by duplicate version elimination
    pub entries_skipped: usize,

    /// Keyspaces that received writes
    pub keyspaces_touched: Vec<String>,

    /// Whether this was an incremental step that left the process open
    pub incremental: bool,
}

impl CommitInfo {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_noop(&self) -> bool {
        self.timestamp.is_none()
    }
}

use crate::types::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stored value bytes. Shared, never mutated after a write.
pub type Value = Arc<[u8]>;

/// (keyspace, key) pair addressing one logical value slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedKey {
    pub keyspace: String,
    pub key: String,
}

impl QualifiedKey {
    pub fn new(keyspace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for QualifiedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.keyspace, self.key)
    }
}

/// Fully resolved coordinate of one version of a value: (branch, timestamp, keyspace, key)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChronoIdentifier {
    branch: String,
    timestamp: Timestamp,
    keyspace: String,
    key: String,
}

impl ChronoIdentifier {
    pub fn new(branch: impl Into<String>, timestamp: Timestamp, key: &QualifiedKey) -> Self {
        Self {
            branch: branch.into(),
            timestamp,
            keyspace: key.keyspace.clone(),
            key: key.key.clone(),
        }
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn qualified_key(&self) -> QualifiedKey {
        QualifiedKey::new(self.keyspace.clone(), self.key.clone())
    }
}

impl fmt::Display for ChronoIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}->{}",
            self.branch, self.timestamp, self.keyspace, self.key
        )
    }
}

/// A key inside one keyspace together with the timestamp it was modified at
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemporalKey {
    pub timestamp: Timestamp,
    pub key: String,
}

/// Raw matrix entry used for bulk loading. `None` marks a deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalEntry {
    pub timestamp: Timestamp,
    pub key: String,
    pub value: Option<Value>,
}

impl TemporalEntry {
    pub fn new(timestamp: Timestamp, key: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            timestamp,
            key: key.into(),
            value,
        }
    }
}

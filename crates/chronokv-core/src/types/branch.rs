use crate::types::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Name of the root branch. Always exists, never has an origin.
pub const MASTER_BRANCH_NAME: &str = "master";

/// Persisted description of a branch
///
/// The origin is stored by name rather than by reference so the branch
/// registry stays a flat map and can be serialized as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchMetadata {
    /// Unique branch name
    pub name: String,

    /// Parent branch name (`None` only for master)
    pub origin: Option<String>,

    /// Timestamp on the parent at which this branch forked
    pub branching_timestamp: Timestamp,

    /// Wall-clock creation time (ISO 8601)
    #[serde(default)]
    pub created_at: String,
}

impl BranchMetadata {
    pub fn master() -> Self {
        Self {
            name: MASTER_BRANCH_NAME.to_string(),
            origin: None,
            branching_timestamp: 0,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn new(
        name: impl Into<String>,
        origin: impl Into<String>,
        branching_timestamp: Timestamp,
    ) -> Self {
        Self {
            name: name.into(),
            origin: Some(origin.into()),
            branching_timestamp,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn is_master(&self) -> bool {
        self.origin.is_none()
    }
}

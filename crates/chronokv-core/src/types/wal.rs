use crate::error::{ChronoError, Result};
use crate::types::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Crash-recovery marker for a commit that is in flight on one branch
///
/// Written before the first physical write of a (full or incremental) commit
/// and erased once the commit, or its rollback, has been fully applied. Its
/// presence at startup means the branch must be rolled back to
/// `now_before_commit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalToken {
    now_before_commit: Timestamp,
    now_after_commit: Timestamp,

    /// ISO 8601 wall-clock time the token was written (diagnostics only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    written_at: Option<String>,
}

impl WalToken {
    pub fn new(now_before_commit: Timestamp, now_after_commit: Timestamp) -> Result<Self> {
        if now_after_commit <= now_before_commit {
            return Err(ChronoError::InvalidTimestamp(format!(
                "WAL token requires after > before, got before={} after={}",
                now_before_commit, now_after_commit
            )));
        }
        Ok(Self {
            now_before_commit,
            now_after_commit,
            written_at: Some(chrono::Utc::now().to_rfc3339()),
        })
    }

    pub fn now_before_commit(&self) -> Timestamp {
        self.now_before_commit
    }

    pub fn now_after_commit(&self) -> Timestamp {
        self.now_after_commit
    }

    pub fn written_at(&self) -> Option<&str> {
        self.written_at.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_requires_after_greater_than_before() {
        assert!(WalToken::new(10, 10).is_err());
        assert!(WalToken::new(10, 9).is_err());
        let token = WalToken::new(10, 11).unwrap();
        assert_eq!(token.now_before_commit(), 10);
        assert_eq!(token.now_after_commit(), 11);
        assert!(token.written_at().is_some());
    }

    #[test]
    fn test_token_json_shape() {
        let token = WalToken::new(1, 2).unwrap();
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["now_before_commit"], 1);
        assert_eq!(json["now_after_commit"], 2);
    }
}

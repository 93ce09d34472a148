use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChronoError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Branching error: {0}")]
    Branching(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Transaction is read-only, cannot {0}")]
    ReadOnlyTransaction(&'static str),

    #[error("Transaction {0} is already closed")]
    TransactionClosed(String),

    #[error("Blind overwrite detected on {} key(s): {}", keys.len(), keys.join(", "))]
    BlindOverwrite { keys: Vec<String> },

    #[error("Another transaction owns the incremental commit process on branch '{branch}'")]
    IncrementalCommitConflict { branch: String },

    #[error("Commit failed: {source}")]
    CommitFailed {
        #[source]
        source: Box<ChronoError>,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error(
        "Database was written by engine format {stored}, which is newer than this engine ({current})"
    )]
    VersionSkew { stored: String, current: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl ChronoError {
    /// Wrap a root cause that interrupted a commit (after rollback completed).
    pub fn commit_failed(source: ChronoError) -> Self {
        ChronoError::CommitFailed {
            source: Box::new(source),
        }
    }

    /// Errors raised before any state change; the caller may fix its input and retry.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ChronoError::Branching(_)
                | ChronoError::InvalidTimestamp(_)
                | ChronoError::ReadOnlyTransaction(_)
                | ChronoError::TransactionClosed(_)
                | ChronoError::Config(_)
        )
    }

    pub fn is_commit_failure(&self) -> bool {
        matches!(self, ChronoError::CommitFailed { .. })
    }

    /// The innermost cause of a (possibly nested) commit failure.
    pub fn root_cause(&self) -> &ChronoError {
        match self {
            ChronoError::CommitFailed { source } => source.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChronoError>;

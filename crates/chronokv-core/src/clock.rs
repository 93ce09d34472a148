//! Commit timestamp source
//!
//! Timestamps are wall-clock milliseconds, bumped logically when the wall
//! clock has not moved past the branch's `now`. Commits never wait for the
//! clock and never reuse or go back in time.

use crate::types::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
enum Source {
    System,
    Manual(Arc<AtomicU64>),
}

#[derive(Debug, Clone)]
pub struct CommitClock {
    source: Source,
}

impl Default for CommitClock {
    fn default() -> Self {
        Self::system()
    }
}

impl CommitClock {
    pub fn system() -> Self {
        Self {
            source: Source::System,
        }
    }

    /// Clock that only moves when told to. Clones share the same time.
    pub fn manual(start: Timestamp) -> Self {
        Self {
            source: Source::Manual(Arc::new(AtomicU64::new(start))),
        }
    }

    /// Current wall time in milliseconds
    pub fn wall(&self) -> Timestamp {
        match &self.source {
            Source::System => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as Timestamp)
                .unwrap_or(0),
            Source::Manual(now) => now.load(Ordering::SeqCst),
        }
    }

    /// Move a manual clock forward. No-op for the system clock.
    pub fn advance(&self, millis: u64) {
        if let Source::Manual(now) = &self.source {
            now.fetch_add(millis, Ordering::SeqCst);
        }
    }

    /// Set a manual clock. No-op for the system clock.
    pub fn set(&self, timestamp: Timestamp) {
        if let Source::Manual(now) = &self.source {
            now.store(timestamp, Ordering::SeqCst);
        }
    }

    /// Smallest usable commit timestamp strictly greater than `now`
    pub fn next_after(&self, now: Timestamp) -> Timestamp {
        self.wall().max(now.saturating_add(1))
    }
}

//! Per-branch incremental commit state
//!
//! At most one transaction per branch may own an incremental commit process.
//! The owner and its reserved timestamp live behind one short-held mutex so
//! the test-and-set of ownership is atomic. The mutex is never held across
//! physical writes.

use chronokv_core::{ChronoError, Result, Timestamp, TransactionId};
use parking_lot::Mutex;

/// An open incremental commit process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementalProcess {
    /// Transaction that owns the process
    pub owner: TransactionId,

    /// Reserved commit timestamp shared by every increment
    pub timestamp: Timestamp,

    /// Branch `now` when the process started
    pub now_before: Timestamp,
}

#[derive(Debug, Default)]
pub struct IncrementalCommitState {
    process: Mutex<Option<IncrementalProcess>>,
}

impl IncrementalCommitState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<IncrementalProcess> {
        *self.process.lock()
    }

    pub fn is_active(&self) -> bool {
        self.process.lock().is_some()
    }

    pub fn is_owned_by(&self, tx: TransactionId) -> bool {
        matches!(*self.process.lock(), Some(p) if p.owner == tx)
    }

    /// The process owned by `tx`, if any
    ///
    /// Fails when another transaction owns the process.
    pub fn owned_process(
        &self,
        branch: &str,
        tx: TransactionId,
    ) -> Result<Option<IncrementalProcess>> {
        match *self.process.lock() {
            Some(process) if process.owner == tx => Ok(Some(process)),
            Some(_) => Err(ChronoError::IncrementalCommitConflict {
                branch: branch.to_string(),
            }),
            None => Ok(None),
        }
    }

    /// Continue the process owned by `tx`, or start one with the timestamp from `reserve`
    ///
    /// Returns the process and whether it was started by this call.
    pub fn begin_or_continue(
        &self,
        branch: &str,
        tx: TransactionId,
        now: Timestamp,
        reserve: impl FnOnce() -> Timestamp,
    ) -> Result<(IncrementalProcess, bool)> {
        let mut slot = self.process.lock();
        match *slot {
            Some(process) if process.owner == tx => Ok((process, false)),
            Some(_) => Err(ChronoError::IncrementalCommitConflict {
                branch: branch.to_string(),
            }),
            None => {
                let timestamp = reserve();
                if timestamp <= now {
                    return Err(ChronoError::InvalidTimestamp(format!(
                        "reserved timestamp {} is not after now {}",
                        timestamp, now
                    )));
                }
                let process = IncrementalProcess {
                    owner: tx,
                    timestamp,
                    now_before: now,
                };
                *slot = Some(process);
                Ok((process, true))
            }
        }
    }

    /// End the process, returning it if one was active
    pub fn terminate(&self) -> Option<IncrementalProcess> {
        self.process.lock().take()
    }
}

//! Scoped lock hierarchy: database -> branch -> commit
//!
//! Every guard acquires its parent scope first and releases in reverse
//! order, so call sites cannot break the ordering by forgetting a level.
//!
//! - [`DatabaseLock`] is process-wide. Exclusive mode is reserved for
//!   whole-database operations (dump reads, shutdown).
//! - [`BranchLocks`] holds the per-branch reader/writer lock and the commit
//!   mutex. Ordinary commits take the branch lock in *shared* mode plus the
//!   commit mutex, so readers are never blocked by writers. Exclusive branch
//!   mode is reserved for operations that invalidate reads (re-indexing).
//!
//! Shared acquisitions are recursive: a thread that already holds a shared
//! guard may take another one even while an exclusive request is queued.

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Process-wide shared/exclusive lock
#[derive(Debug, Default)]
pub struct DatabaseLock {
    lock: RwLock<()>,
}

enum Mode<'a> {
    Shared(RwLockReadGuard<'a, ()>),
    Exclusive(RwLockWriteGuard<'a, ()>),
}

impl Mode<'_> {
    fn is_exclusive(&self) -> bool {
        matches!(self, Mode::Exclusive(_))
    }
}

/// Held database lock. Released on drop.
pub struct DatabaseGuard<'a> {
    mode: Mode<'a>,
}

impl DatabaseGuard<'_> {
    pub fn is_exclusive(&self) -> bool {
        self.mode.is_exclusive()
    }
}

impl DatabaseLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(&self) -> DatabaseGuard<'_> {
        DatabaseGuard {
            mode: Mode::Shared(self.lock.read_recursive()),
        }
    }

    pub fn exclusive(&self) -> DatabaseGuard<'_> {
        DatabaseGuard {
            mode: Mode::Exclusive(self.lock.write()),
        }
    }
}

/// Held branch lock together with the shared database lock beneath it
pub struct BranchGuard<'a> {
    // Field order is drop order: branch first, then database.
    mode: Mode<'a>,
    _database: DatabaseGuard<'a>,
}

impl BranchGuard<'_> {
    pub fn is_exclusive(&self) -> bool {
        self.mode.is_exclusive()
    }
}

/// Held commit mutex together with the shared branch and database locks
pub struct CommitGuard<'a> {
    _commit: MutexGuard<'a, ()>,
    _branch: BranchGuard<'a>,
}

/// Locks owned by one branch
#[derive(Debug)]
pub struct BranchLocks {
    database: Arc<DatabaseLock>,
    branch: RwLock<()>,
    commit: Mutex<()>,
}

impl BranchLocks {
    pub fn new(database: Arc<DatabaseLock>) -> Self {
        Self {
            database,
            branch: RwLock::new(()),
            commit: Mutex::new(()),
        }
    }

    /// Shared database + shared branch. Used by reads.
    pub fn read(&self) -> BranchGuard<'_> {
        let database = self.database.shared();
        BranchGuard {
            mode: Mode::Shared(self.branch.read_recursive()),
            _database: database,
        }
    }

    /// Shared database + exclusive branch. Blocks readers of this branch.
    pub fn exclusive(&self) -> BranchGuard<'_> {
        let database = self.database.shared();
        BranchGuard {
            mode: Mode::Exclusive(self.branch.write()),
            _database: database,
        }
    }

    /// Shared database + shared branch + commit mutex.
    pub fn commit(&self) -> CommitGuard<'_> {
        let branch = self.read();
        CommitGuard {
            _commit: self.commit.lock(),
            _branch: branch,
        }
    }

    pub fn database(&self) -> &Arc<DatabaseLock> {
        &self.database
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn locks() -> Arc<BranchLocks> {
        Arc::new(BranchLocks::new(Arc::new(DatabaseLock::new())))
    }

    #[test]
    fn test_commit_does_not_block_readers() {
        let locks = locks();
        let _commit = locks.commit();

        let locks2 = locks.clone();
        let handle = thread::spawn(move || {
            let guard = locks2.read();
            !guard.is_exclusive()
        });
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_commits_are_serialized() {
        let locks = locks();
        let inside = Arc::new(AtomicBool::new(false));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..50 {
                        let _guard = locks.commit();
                        assert!(!inside.swap(true, Ordering::SeqCst));
                        thread::yield_now();
                        inside.store(false, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_exclusive_database_blocks_commits() {
        let locks = locks();
        let committed = Arc::new(AtomicBool::new(false));

        let exclusive = locks.database().exclusive();
        assert!(exclusive.is_exclusive());

        let handle = {
            let locks = locks.clone();
            let committed = committed.clone();
            thread::spawn(move || {
                let _guard = locks.commit();
                committed.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!committed.load(Ordering::SeqCst));

        drop(exclusive);
        handle.join().unwrap();
        assert!(committed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_exclusive_branch_waits_for_readers() {
        let locks = locks();
        let acquired = Arc::new(AtomicBool::new(false));

        let reader = locks.read();
        let handle = {
            let locks = locks.clone();
            let acquired = acquired.clone();
            thread::spawn(move || {
                let guard = locks.exclusive();
                assert!(guard.is_exclusive());
                acquired.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));

        drop(reader);
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_nested_shared_reads_do_not_deadlock() {
        let locks = locks();
        let _outer = locks.read();
        let _inner = locks.read();
        let _database = locks.database().shared();
    }
}

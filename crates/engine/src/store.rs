//! In-memory single-node transaction manager

use crate::{EngineError, LocalStore, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Isolation level for a local transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Opaque handle to an open local transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalTxn(pub u64);

/// In-memory [`LocalStore`] used by tests
///
/// Tracks open transactions by handle; `fail_next_commit` lets a test force
/// the local-commit failure path of the 2PC engine.
pub struct MemoryStore {
    next_id: AtomicU64,
    open: Mutex<HashMap<u64, IsolationLevel>>,
    fail_next_commit: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            open: Mutex::new(HashMap::new()),
            fail_next_commit: AtomicBool::new(false),
        }
    }

    /// Force the next `commit` call to be refused
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Number of local transactions currently open
    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore for MemoryStore {
    fn begin(&self, isolation: IsolationLevel) -> Result<LocalTxn> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.open.lock().insert(id, isolation);
        Ok(LocalTxn(id))
    }

    fn commit(&self, txn: LocalTxn) -> Result<bool> {
        if self.open.lock().remove(&txn.0).is_none() {
            return Err(EngineError::UnknownTransaction(txn.0));
        }
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        Ok(true)
    }

    fn rollback(&self, txn: LocalTxn) -> Result<()> {
        if self.open.lock().remove(&txn.0).is_none() {
            return Err(EngineError::UnknownTransaction(txn.0));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_commit_releases_handle() {
        let store = MemoryStore::new();
        let txn = store.begin(IsolationLevel::Serializable).unwrap();
        assert_eq!(store.open_count(), 1);

        assert!(store.commit(txn).unwrap());
        assert_eq!(store.open_count(), 0);

        // Double commit is an unknown handle, not a silent success
        assert!(store.commit(txn).is_err());
    }

    #[test]
    fn forced_commit_failure_is_one_shot() {
        let store = MemoryStore::new();
        store.fail_next_commit();

        let a = store.begin(IsolationLevel::Serializable).unwrap();
        let b = store.begin(IsolationLevel::Serializable).unwrap();

        assert!(!store.commit(a).unwrap());
        assert!(store.commit(b).unwrap());
    }

    #[test]
    fn rollback_releases_handle() {
        let store = MemoryStore::new();
        let txn = store.begin(IsolationLevel::ReadCommitted).unwrap();
        store.rollback(txn).unwrap();
        assert_eq!(store.open_count(), 0);
    }
}

//! Aggregate transaction counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomically updated counters shared by the protocol engine and scheduler
#[derive(Debug, Default)]
pub(crate) struct Stats {
    pub total: AtomicU64,
    pub committed: AtomicU64,
    pub aborted: AtomicU64,
    pub timed_out: AtomicU64,
}

impl Stats {
    pub fn snapshot(&self) -> CoordinatorStats {
        CoordinatorStats {
            total: self.total.load(Ordering::SeqCst),
            committed: self.committed.load(Ordering::SeqCst),
            aborted: self.aborted.load(Ordering::SeqCst),
            timed_out: self.timed_out.load(Ordering::SeqCst),
        }
    }
}

/// Point-in-time view of the coordinator's counters
///
/// Once every transaction has reached a terminal state,
/// `committed + aborted == total`. Timed-out transactions are counted in
/// both `aborted` and `timed_out`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub total: u64,
    pub committed: u64,
    pub aborted: u64,
    pub timed_out: u64,
}

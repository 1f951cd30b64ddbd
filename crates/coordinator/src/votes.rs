//! Prepare-vote collection correlated by transaction id
//!
//! Participants answer a prepare with `PREPARE_OK` or `PREPARE_FAIL`;
//! `handle_message` records the vote here and the protocol engine waits for
//! the full set (or the transaction deadline) before deciding the outcome.
//! Prepare outcomes derive only from recorded votes, never from anything
//! synthesized locally.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::time::Instant;

/// A participant's prepare vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Commit,
    Abort,
}

#[derive(Default)]
pub(crate) struct VoteBoard {
    votes: Mutex<HashMap<u64, HashMap<String, Vote>>>,
    arrived: Condvar,
}

impl VoteBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a vote and wake any waiter
    ///
    /// A duplicate vote from the same participant keeps the first value.
    pub fn record(&self, txn_id: u64, node_id: impl Into<String>, vote: Vote) {
        let mut votes = self.votes.lock();
        votes
            .entry(txn_id)
            .or_default()
            .entry(node_id.into())
            .or_insert(vote);
        self.arrived.notify_all();
    }

    /// Wait until `expected` votes for `txn_id` have arrived or `deadline`
    /// passes, then take and return whatever has been gathered
    pub fn wait_for(
        &self,
        txn_id: u64,
        expected: usize,
        deadline: Instant,
    ) -> HashMap<String, Vote> {
        let mut votes = self.votes.lock();

        loop {
            let gathered = votes.get(&txn_id).map(|v| v.len()).unwrap_or(0);
            if gathered >= expected {
                break;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            self.arrived.wait_for(&mut votes, remaining);
        }

        votes.remove(&txn_id).unwrap_or_default()
    }

    /// Drop any votes still parked for a finished transaction
    pub fn discard(&self, txn_id: u64) {
        self.votes.lock().remove(&txn_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn votes_recorded_before_wait_return_immediately() {
        let board = VoteBoard::new();
        board.record(1, "node-1", Vote::Commit);
        board.record(1, "node-2", Vote::Abort);

        let votes = board.wait_for(1, 2, Instant::now() + Duration::from_millis(10));
        assert_eq!(votes.get("node-1"), Some(&Vote::Commit));
        assert_eq!(votes.get("node-2"), Some(&Vote::Abort));
    }

    #[test]
    fn wait_returns_partial_set_at_deadline() {
        let board = VoteBoard::new();
        board.record(1, "node-1", Vote::Commit);

        let started = Instant::now();
        let votes = board.wait_for(1, 3, started + Duration::from_millis(50));
        assert_eq!(votes.len(), 1);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn waiter_is_woken_by_late_vote() {
        let board = Arc::new(VoteBoard::new());

        let voter = {
            let board = board.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(30));
                board.record(1, "node-1", Vote::Commit);
            })
        };

        let votes = board.wait_for(1, 1, Instant::now() + Duration::from_secs(5));
        assert_eq!(votes.get("node-1"), Some(&Vote::Commit));
        voter.join().unwrap();
    }

    #[test]
    fn duplicate_votes_keep_the_first() {
        let board = VoteBoard::new();
        board.record(1, "node-1", Vote::Commit);
        board.record(1, "node-1", Vote::Abort);

        let votes = board.wait_for(1, 1, Instant::now());
        assert_eq!(votes.get("node-1"), Some(&Vote::Commit));
    }

    #[test]
    fn votes_are_scoped_per_transaction() {
        let board = VoteBoard::new();
        board.record(1, "node-1", Vote::Commit);
        board.record(2, "node-1", Vote::Abort);

        let one = board.wait_for(1, 1, Instant::now());
        assert_eq!(one.get("node-1"), Some(&Vote::Commit));

        let two = board.wait_for(2, 1, Instant::now());
        assert_eq!(two.get("node-1"), Some(&Vote::Abort));
    }
}

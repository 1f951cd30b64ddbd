//! Two-phase-commit protocol engine
//!
//! Drives prepare/commit/abort for one transaction at a time against the
//! transport and local-store boundaries. The per-transaction lock is never
//! held across a `send` call; it is re-acquired afterwards to apply the
//! result, so status readers are not serialized behind participant I/O.

use crate::error::{CoordinatorError, Result};
use crate::stats::Stats;
use crate::transaction::{DistributedTxn, TxnState};
use crate::votes::{Vote, VoteBoard};
use std::sync::Arc;
use std::time::Instant;
use strata_engine::{LocalStore, Transport};
use strata_protocol::{MessageType, TxnMessage};

pub(crate) struct Executor {
    coordinator_id: String,
    transport: Arc<dyn Transport>,
    store: Arc<dyn LocalStore>,
    votes: Arc<VoteBoard>,
    stats: Arc<Stats>,
}

impl Executor {
    pub fn new(
        coordinator_id: String,
        transport: Arc<dyn Transport>,
        store: Arc<dyn LocalStore>,
        votes: Arc<VoteBoard>,
        stats: Arc<Stats>,
    ) -> Self {
        Self {
            coordinator_id,
            transport,
            store,
            votes,
            stats,
        }
    }

    /// Run the prepare phase
    ///
    /// Sends `PREPARE` to every participant, then waits for the votes of all
    /// participants that received the message, bounded by the transaction
    /// deadline. A send failure marks that participant aborted immediately;
    /// the pass always completes before deciding the aggregate outcome.
    ///
    /// Returns `InvalidState` unless the transaction is in `Preparing`,
    /// `Timeout` if the deadline expired before all votes arrived, and
    /// `PrepareFailed` if any participant voted no or was unreachable.
    pub fn prepare(&self, txn: &Arc<DistributedTxn>) -> Result<()> {
        let txn_id = txn.id();

        let targets: Vec<String> = {
            let mut inner = txn.lock();
            if inner.status != TxnState::Preparing || inner.prepare_started {
                return Err(CoordinatorError::InvalidState(format!(
                    "cannot prepare transaction {txn_id} in state {:?}",
                    inner.status
                )));
            }
            inner.prepare_started = true;
            inner.start_time = Some(Instant::now());
            inner
                .participants
                .iter()
                .map(|p| p.node_id.clone())
                .collect()
        };

        let mut sent = 0usize;
        for node_id in &targets {
            let message = TxnMessage::new(
                MessageType::Prepare,
                txn_id,
                self.coordinator_id.clone(),
                node_id.clone(),
            )
            .with_timeout_ms(txn.timeout_ms());

            match self.transport.send(node_id, message) {
                Ok(()) => {
                    sent += 1;
                    let mut inner = txn.lock();
                    if let Some(p) = inner.participants.iter_mut().find(|p| &p.node_id == node_id)
                    {
                        p.prepare_time = Some(Instant::now());
                    }
                }
                Err(e) => {
                    tracing::warn!(txn_id, node = %node_id, error = %e, "prepare send failed");
                    let mut inner = txn.lock();
                    if let Some(p) = inner.participants.iter_mut().find(|p| &p.node_id == node_id)
                    {
                        p.status = TxnState::Aborted;
                        p.prepare_result = Some(false);
                    }
                }
            }
        }

        let votes = self.votes.wait_for(txn_id, sent, txn.deadline());
        let expired = txn.is_expired(Instant::now()) && votes.len() < sent;
        let now = Instant::now();

        let mut inner = txn.lock();
        if inner.status != TxnState::Preparing {
            // The timeout loop got here first
            return Err(CoordinatorError::Timeout);
        }

        let mut prepared = 0usize;
        for participant in inner.participants.iter_mut() {
            match votes.get(&participant.node_id) {
                Some(Vote::Commit) => {
                    participant.status = TxnState::Prepared;
                    participant.response_time = Some(now);
                    participant.prepare_result = Some(true);
                    prepared += 1;
                }
                Some(Vote::Abort) => {
                    participant.status = TxnState::Aborted;
                    participant.response_time = Some(now);
                    participant.prepare_result = Some(false);
                }
                None => {
                    // Never voted: either the send already failed or the
                    // deadline ran out waiting.
                    participant.status = TxnState::Aborted;
                    participant.prepare_result = Some(false);
                }
            }
        }
        inner.prepared_count = prepared;
        let total = inner.participants.len();

        if prepared == total {
            inner.status = TxnState::Prepared;
            tracing::debug!(txn_id, prepared, "all participants prepared");
            Ok(())
        } else {
            inner.status = TxnState::Aborting;
            if expired {
                tracing::warn!(txn_id, prepared, total, "prepare timed out");
                Err(CoordinatorError::Timeout)
            } else {
                tracing::warn!(txn_id, prepared, total, "prepare failed");
                Err(CoordinatorError::PrepareFailed { prepared, total })
            }
        }
    }

    /// Run the commit phase
    ///
    /// Commits the local transaction first; if the local store refuses, the
    /// transaction moves to `Aborting` and no participant sees a `COMMIT`.
    /// On local success, sends `COMMIT` to every prepared participant and
    /// finalizes the transaction.
    pub fn commit(&self, txn: &Arc<DistributedTxn>) -> Result<()> {
        let txn_id = txn.id();

        let targets: Vec<String> = {
            let mut inner = txn.lock();
            match inner.status {
                TxnState::Prepared => inner.status = TxnState::Committing,
                TxnState::Committing => {}
                status => {
                    return Err(CoordinatorError::InvalidState(format!(
                        "cannot commit transaction {txn_id} in state {status:?}"
                    )));
                }
            }
            inner
                .participants
                .iter()
                .filter(|p| p.status == TxnState::Prepared)
                .map(|p| p.node_id.clone())
                .collect()
        };

        match self.store.commit(txn.local_txn()) {
            Ok(true) => {}
            Ok(false) => {
                txn.lock().status = TxnState::Aborting;
                tracing::warn!(txn_id, "local commit refused");
                return Err(CoordinatorError::CommitFailed(
                    "local transaction commit refused".to_string(),
                ));
            }
            Err(e) => {
                txn.lock().status = TxnState::Aborting;
                tracing::warn!(txn_id, error = %e, "local commit failed");
                return Err(CoordinatorError::CommitFailed(e.to_string()));
            }
        }

        for node_id in &targets {
            let message = TxnMessage::new(
                MessageType::Commit,
                txn_id,
                self.coordinator_id.clone(),
                node_id.clone(),
            );

            match self.transport.send(node_id, message) {
                Ok(()) => {
                    let mut inner = txn.lock();
                    if let Some(p) = inner.participants.iter_mut().find(|p| &p.node_id == node_id)
                    {
                        p.status = TxnState::Committed;
                    }
                    inner.committed_count += 1;
                }
                Err(e) => {
                    tracing::warn!(txn_id, node = %node_id, error = %e, "commit send failed");
                }
            }
        }

        txn.lock().status = TxnState::Committed;
        self.stats.committed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.votes.discard(txn_id);
        tracing::info!(txn_id, "transaction committed");
        Ok(())
    }

    /// Abort the transaction
    ///
    /// Valid from any state except `Committed`. Rolls back the local
    /// transaction, sends `ABORT` to every participant not already aborted,
    /// and counts the abort exactly once. Returns `Ok(true)` if this call
    /// performed the abort and `Ok(false)` if it was a no-op because the
    /// transaction was already aborted or another caller is finishing the
    /// abort; callers that attribute the abort (e.g. to a timeout) must only
    /// do so on `Ok(true)`.
    pub fn abort(&self, txn: &Arc<DistributedTxn>) -> Result<bool> {
        let txn_id = txn.id();

        let targets: Vec<String> = {
            let mut inner = txn.lock();
            match inner.status {
                TxnState::Committed => {
                    return Err(CoordinatorError::InvalidState(format!(
                        "cannot abort committed transaction {txn_id}"
                    )));
                }
                TxnState::Aborted => return Ok(false),
                _ => {}
            }
            if inner.abort_started {
                return Ok(false);
            }
            inner.abort_started = true;
            inner.status = TxnState::Aborting;
            inner
                .participants
                .iter()
                .filter(|p| p.status != TxnState::Aborted)
                .map(|p| p.node_id.clone())
                .collect()
        };

        // The local handle may already be gone after a refused commit;
        // that is not an abort failure.
        if let Err(e) = self.store.rollback(txn.local_txn()) {
            tracing::debug!(txn_id, error = %e, "local rollback skipped");
        }

        for node_id in &targets {
            let message = TxnMessage::new(
                MessageType::Abort,
                txn_id,
                self.coordinator_id.clone(),
                node_id.clone(),
            );

            if let Err(e) = self.transport.send(node_id, message) {
                tracing::debug!(txn_id, node = %node_id, error = %e, "abort send failed");
            }

            let mut inner = txn.lock();
            if let Some(p) = inner.participants.iter_mut().find(|p| &p.node_id == node_id) {
                p.status = TxnState::Aborted;
            }
        }

        txn.lock().status = TxnState::Aborted;
        self.stats.aborted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.votes.discard(txn_id);
        tracing::info!(txn_id, "transaction aborted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Priority;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use strata_engine::{IsolationLevel, MemoryBus, MemoryStore};

    fn executor_and_txn() -> (Executor, Arc<DistributedTxn>, Arc<Stats>) {
        let store = Arc::new(MemoryStore::new());
        let local = store.begin(IsolationLevel::Serializable).unwrap();
        let stats = Arc::new(Stats::default());
        let executor = Executor::new(
            "coord".to_string(),
            Arc::new(MemoryBus::new()),
            store,
            Arc::new(VoteBoard::new()),
            stats.clone(),
        );
        let txn = Arc::new(DistributedTxn::new(
            1,
            "coord",
            Priority::Normal,
            Duration::from_secs(30),
            vec!["node-1".to_string()],
            local,
        ));
        (executor, txn, stats)
    }

    #[test]
    fn repeated_abort_is_counted_once() {
        let (executor, txn, stats) = executor_and_txn();

        // Only the call that performs the abort reports true
        assert!(executor.abort(&txn).unwrap());
        assert!(!executor.abort(&txn).unwrap());

        assert_eq!(txn.status(), TxnState::Aborted);
        assert_eq!(stats.aborted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn abort_of_a_committed_transaction_is_rejected() {
        let (executor, txn, _stats) = executor_and_txn();
        txn.lock().status = TxnState::Committed;

        assert!(matches!(
            executor.abort(&txn),
            Err(CoordinatorError::InvalidState(_))
        ));
        assert_eq!(txn.status(), TxnState::Committed);
    }
}

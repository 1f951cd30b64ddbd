//! Core coordinator implementation

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, Result};
use crate::executor::Executor;
use crate::nodes::NodeTable;
use crate::queue::ScheduleQueue;
use crate::registry::TxnRegistry;
use crate::stats::{CoordinatorStats, Stats};
use crate::transaction::{DistributedTxn, Priority};
use crate::votes::{Vote, VoteBoard};
use crate::{heartbeat, scheduler, timeout};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use strata_engine::{IsolationLevel, LocalStore, Transport};
use strata_protocol::{MessageType, TxnMessage};

/// Scheduling policy for pending transactions
///
/// Only `Priority` is implemented; the other values are accepted and behave
/// identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePolicy {
    Fifo,
    Priority,
    Deadline,
    Adaptive,
}

/// Distributed transaction coordinator
///
/// Owns the node table, transaction registry, and schedule queue, plus the
/// three background threads (scheduler, heartbeat, timeout) started by
/// [`start`](Coordinator::start) and joined by [`stop`](Coordinator::stop).
/// Protocol operations may also be invoked directly by a caller; each
/// transaction's own mutex makes that safe alongside the scheduler.
pub struct Coordinator {
    coordinator_id: String,
    config: CoordinatorConfig,
    transport: Arc<dyn Transport>,
    store: Arc<dyn LocalStore>,

    nodes: Arc<NodeTable>,
    registry: Arc<TxnRegistry>,
    queue: Arc<ScheduleQueue>,
    votes: Arc<VoteBoard>,
    executor: Arc<Executor>,
    stats: Arc<Stats>,

    next_txn_id: AtomicU64,
    policy: Mutex<SchedulePolicy>,
    running: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Create a coordinator with default configuration
    pub fn new(
        coordinator_id: impl Into<String>,
        transport: Arc<dyn Transport>,
        store: Arc<dyn LocalStore>,
    ) -> Self {
        Self::with_config(coordinator_id, transport, store, CoordinatorConfig::default())
    }

    /// Create a coordinator with explicit configuration
    pub fn with_config(
        coordinator_id: impl Into<String>,
        transport: Arc<dyn Transport>,
        store: Arc<dyn LocalStore>,
        config: CoordinatorConfig,
    ) -> Self {
        let coordinator_id = coordinator_id.into();
        let votes = Arc::new(VoteBoard::new());
        let stats = Arc::new(Stats::default());
        let executor = Arc::new(Executor::new(
            coordinator_id.clone(),
            transport.clone(),
            store.clone(),
            votes.clone(),
            stats.clone(),
        ));

        Self {
            coordinator_id,
            queue: Arc::new(ScheduleQueue::new(config.queue_capacity, config.enqueue_wait)),
            config,
            transport,
            store,
            nodes: Arc::new(NodeTable::new()),
            registry: Arc::new(TxnRegistry::new()),
            votes,
            executor,
            stats,
            next_txn_id: AtomicU64::new(1),
            policy: Mutex::new(SchedulePolicy::Priority),
            running: Arc::new(AtomicBool::new(false)),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Id of this coordinator
    pub fn id(&self) -> &str {
        &self.coordinator_id
    }

    /// Start the scheduler, heartbeat, and timeout threads
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CoordinatorError::InvalidState(
                "coordinator already started".to_string(),
            ));
        }

        let mut threads = self.threads.lock();
        threads.push(scheduler::start(
            self.running.clone(),
            self.queue.clone(),
            self.executor.clone(),
            self.stats.clone(),
            self.config.clone(),
        ));
        threads.push(heartbeat::start(
            self.running.clone(),
            self.coordinator_id.clone(),
            self.nodes.clone(),
            self.transport.clone(),
            self.config.clone(),
        ));
        threads.push(timeout::start(
            self.running.clone(),
            self.registry.clone(),
            self.queue.clone(),
            self.config.clone(),
        ));

        tracing::info!(coordinator = %self.coordinator_id, "coordinator started");
        Ok(())
    }

    /// Stop and join the background threads
    ///
    /// In-flight transactions are not aborted; whatever state they are in
    /// stays in the registry.
    pub fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(CoordinatorError::InvalidState(
                "coordinator not started".to_string(),
            ));
        }

        for handle in self.threads.lock().drain(..) {
            if handle.join().is_err() {
                tracing::warn!("background thread panicked during shutdown");
            }
        }

        tracing::info!(coordinator = %self.coordinator_id, "coordinator stopped");
        Ok(())
    }

    /// Register a participant node
    pub fn add_node(
        &self,
        node_id: impl Into<String>,
        address: impl Into<String>,
        port: u16,
    ) -> Result<()> {
        self.nodes.add_node(node_id, address, port)
    }

    /// Remove a participant node
    pub fn remove_node(&self, node_id: &str) -> Result<()> {
        self.nodes.remove_node(node_id)
    }

    /// Begin a distributed transaction
    ///
    /// Allocates a global transaction id, opens the local transaction at
    /// `Serializable`, registers the transaction, and pushes it onto the
    /// schedule queue. Every participant id must name a registered node.
    pub fn begin(
        &self,
        priority: Priority,
        timeout: Duration,
        participant_ids: &[&str],
    ) -> Result<Arc<DistributedTxn>> {
        if participant_ids.is_empty() {
            return Err(CoordinatorError::InvalidArgument(
                "participant list is empty".to_string(),
            ));
        }
        for id in participant_ids {
            if !self.nodes.contains(id) {
                return Err(CoordinatorError::NodeUnavailable(id.to_string()));
            }
        }

        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let local_txn = self.store.begin(IsolationLevel::Serializable)?;

        let txn = Arc::new(DistributedTxn::new(
            txn_id,
            self.coordinator_id.clone(),
            priority,
            timeout,
            participant_ids.iter().map(|s| s.to_string()).collect(),
            local_txn,
        ));

        self.registry.insert(txn.clone());
        if let Err(e) = self.queue.enqueue(txn.clone()) {
            // Roll everything back; the transaction never existed
            self.registry.remove(txn_id);
            if let Err(re) = self.store.rollback(local_txn) {
                tracing::warn!(txn_id, error = %re, "rollback after enqueue failure");
            }
            return Err(e);
        }

        self.stats.total.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            txn_id,
            participants = participant_ids.len(),
            ?priority,
            "transaction begun"
        );
        Ok(txn)
    }

    /// Run the prepare phase for a transaction
    pub fn prepare(&self, txn: &Arc<DistributedTxn>) -> Result<()> {
        self.executor.prepare(txn)
    }

    /// Run the commit phase for a transaction
    pub fn commit(&self, txn: &Arc<DistributedTxn>) -> Result<()> {
        self.executor.commit(txn)
    }

    /// Abort a transaction
    ///
    /// A no-op if the transaction is already aborted.
    pub fn abort(&self, txn: &Arc<DistributedTxn>) -> Result<()> {
        self.executor.abort(txn).map(|_| ())
    }

    /// Entry point for inbound messages from the transport
    ///
    /// Heartbeats refresh node liveness; prepare votes feed the vote board.
    /// Decision acknowledgements and anything else are logged and dropped.
    pub fn handle_message(&self, message: TxnMessage) -> Result<()> {
        match message.message_type {
            MessageType::Heartbeat => {
                if !self.nodes.record_heartbeat(&message.sender_id) {
                    tracing::debug!(sender = %message.sender_id, "heartbeat from unknown node");
                }
            }
            MessageType::PrepareOk => {
                self.votes
                    .record(message.global_txn_id, message.sender_id, Vote::Commit);
            }
            MessageType::PrepareFail => {
                self.votes
                    .record(message.global_txn_id, message.sender_id, Vote::Abort);
            }
            ack if ack.is_ack() => {
                tracing::debug!(
                    txn_id = message.global_txn_id,
                    sender = %message.sender_id,
                    kind = ack.as_str(),
                    "decision acknowledged"
                );
            }
            other => {
                tracing::debug!(kind = other.as_str(), "ignoring unexpected message");
            }
        }
        Ok(())
    }

    /// Look up a transaction by id
    pub fn transaction(&self, txn_id: u64) -> Option<Arc<DistributedTxn>> {
        self.registry.get(txn_id)
    }

    /// Value copy of a registered node's record
    pub fn node(&self, node_id: &str) -> Option<crate::nodes::Node> {
        self.nodes.get(node_id)
    }

    /// Number of transactions waiting in the schedule queue
    pub fn queued(&self) -> usize {
        self.queue.size()
    }

    /// Aggregate transaction counters
    pub fn stats(&self) -> CoordinatorStats {
        self.stats.snapshot()
    }

    /// Set the scheduling policy
    ///
    /// All policies currently schedule priority-then-FIFO.
    pub fn set_schedule_policy(&self, policy: SchedulePolicy) {
        *self.policy.lock() = policy;
    }

    /// The currently configured scheduling policy
    pub fn schedule_policy(&self) -> SchedulePolicy {
        *self.policy.lock()
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            let _ = self.stop();
        }
    }
}

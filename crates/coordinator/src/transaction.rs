//! Distributed transaction state

use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use strata_engine::LocalTxn;

/// Transaction (and participant) state in the 2PC protocol
///
/// States only move forward: `Preparing → Prepared → Committing →
/// Committed`, with `Aborting → Aborted` reachable from any non-terminal
/// state. `Committed` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// Initial state; prepare has not completed
    Preparing,
    /// All participants voted to commit
    Prepared,
    /// Commit phase has started
    Committing,
    /// Transaction has been committed
    Committed,
    /// Abort phase has started
    Aborting,
    /// Transaction has been aborted
    Aborted,
}

impl TxnState {
    /// Whether no further transitions can occur
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }

    /// Whether the state machine permits moving from `self` to `to`
    pub fn can_transition(&self, to: TxnState) -> bool {
        matches!(
            (self, to),
            (Self::Preparing, Self::Prepared)
                | (Self::Prepared, Self::Committing)
                | (Self::Committing, Self::Committed)
                | (Self::Preparing, Self::Aborting)
                | (Self::Prepared, Self::Aborting)
                | (Self::Committing, Self::Aborting)
                | (Self::Aborting, Self::Aborted)
        )
    }
}

/// Scheduling priority; higher values are dequeued first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

/// Per-transaction record of one remote participant
#[derive(Debug, Clone)]
pub struct Participant {
    /// Node id of the participant
    pub node_id: String,
    /// Participant-local protocol state
    pub status: TxnState,
    /// When the prepare message was handed to the transport
    pub prepare_time: Option<Instant>,
    /// When the prepare vote arrived
    pub response_time: Option<Instant>,
    /// Outcome of the prepare phase for this participant
    pub prepare_result: Option<bool>,
}

impl Participant {
    fn new(node_id: String) -> Self {
        Self {
            node_id,
            status: TxnState::Preparing,
            prepare_time: None,
            response_time: None,
            prepare_result: None,
        }
    }
}

/// Mutable portion of a transaction, guarded by its own mutex
///
/// The coordinator-level registry lock is never required to touch this, so
/// long-running participant I/O does not serialize unrelated transactions.
#[derive(Debug)]
pub(crate) struct TxnInner {
    pub status: TxnState,
    pub participants: Vec<Participant>,
    pub prepared_count: usize,
    pub committed_count: usize,
    /// Set when the scheduler (or a direct caller) first drives the transaction
    pub start_time: Option<Instant>,
    /// Guards against a second concurrent prepare pass
    pub prepare_started: bool,
    /// Guards against double-counting a finished abort
    pub abort_started: bool,
}

/// A distributed transaction owned by the registry
///
/// Identity, priority, and deadline are immutable after creation; protocol
/// state lives behind the per-transaction mutex. Shared between the
/// registry and the schedule queue via `Arc`.
#[derive(Debug)]
pub struct DistributedTxn {
    global_txn_id: u64,
    coordinator_id: String,
    priority: Priority,
    timeout: Duration,
    create_time: Instant,
    deadline: Instant,
    local_txn: LocalTxn,
    /// True while the transaction sits in the schedule queue
    in_queue: AtomicBool,
    inner: Mutex<TxnInner>,
}

impl DistributedTxn {
    pub(crate) fn new(
        global_txn_id: u64,
        coordinator_id: impl Into<String>,
        priority: Priority,
        timeout: Duration,
        participant_ids: Vec<String>,
        local_txn: LocalTxn,
    ) -> Self {
        let create_time = Instant::now();
        let participants = participant_ids.into_iter().map(Participant::new).collect();

        Self {
            global_txn_id,
            coordinator_id: coordinator_id.into(),
            priority,
            timeout,
            create_time,
            deadline: create_time + timeout,
            local_txn,
            in_queue: AtomicBool::new(false),
            inner: Mutex::new(TxnInner {
                status: TxnState::Preparing,
                participants,
                prepared_count: 0,
                committed_count: 0,
                start_time: None,
                prepare_started: false,
                abort_started: false,
            }),
        }
    }

    /// Unique, monotonically assigned transaction id
    pub fn id(&self) -> u64 {
        self.global_txn_id
    }

    /// Id of the coordinator that owns this transaction
    pub fn coordinator_id(&self) -> &str {
        &self.coordinator_id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn create_time(&self) -> Instant {
        self.create_time
    }

    /// Absolute time after which the transaction is eligible for timeout-abort
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// Handle to the node-local transaction opened at begin
    pub fn local_txn(&self) -> LocalTxn {
        self.local_txn
    }

    /// Whether `now` has passed the deadline
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    pub fn status(&self) -> TxnState {
        self.inner.lock().status
    }

    /// When the protocol engine first picked the transaction up
    pub fn start_time(&self) -> Option<Instant> {
        self.inner.lock().start_time
    }

    pub fn participant_count(&self) -> usize {
        self.inner.lock().participants.len()
    }

    pub fn prepared_count(&self) -> usize {
        self.inner.lock().prepared_count
    }

    pub fn committed_count(&self) -> usize {
        self.inner.lock().committed_count
    }

    /// Copy of the participant records, for inspection
    pub fn participants(&self) -> Vec<Participant> {
        self.inner.lock().participants.clone()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, TxnInner> {
        self.inner.lock()
    }

    /// Claim the queue slot; false if the transaction is already queued
    pub(crate) fn try_mark_queued(&self) -> bool {
        !self.in_queue.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn clear_queued(&self) {
        self.in_queue.store(false, Ordering::SeqCst);
    }

    /// Move a non-terminal transaction to `Aborting`
    ///
    /// Returns false if the transaction is terminal or already aborting.
    /// Used by the timeout loop; the actual abort (and statistics) happen in
    /// the scheduler.
    pub(crate) fn mark_aborting(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.status.can_transition(TxnState::Aborting) {
            inner.status = TxnState::Aborting;
            true
        } else {
            false
        }
    }
}

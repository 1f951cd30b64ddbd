//! Scheduler loop: dequeues transactions and drives them through 2PC

use crate::config::CoordinatorConfig;
use crate::error::CoordinatorError;
use crate::executor::Executor;
use crate::queue::ScheduleQueue;
use crate::stats::Stats;
use crate::transaction::TxnState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Start the scheduler thread
///
/// Each iteration dequeues with a bounded timeout, enforces the deadline,
/// then advances the transaction: a `Preparing` transaction runs the prepare
/// pass and is re-enqueued as `Committing` on success; a `Committing`
/// transaction runs the commit pass. Failures drive the abort path. Only
/// this loop updates the timeout counter.
pub(crate) fn start(
    running: Arc<AtomicBool>,
    queue: Arc<ScheduleQueue>,
    executor: Arc<Executor>,
    stats: Arc<Stats>,
    config: CoordinatorConfig,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("txn-scheduler".to_string())
        .spawn(move || {
            while running.load(Ordering::SeqCst) {
                let Some(txn) = queue.dequeue(config.dequeue_timeout) else {
                    continue;
                };
                let txn_id = txn.id();
                let status = txn.status();

                if !status.is_terminal() && txn.is_expired(Instant::now()) {
                    tracing::info!(txn_id, "deadline passed, aborting");
                    // Only count the timeout if this call performed the abort;
                    // a direct caller may have finished it already.
                    if matches!(executor.abort(&txn), Ok(true)) {
                        stats.timed_out.fetch_add(1, Ordering::SeqCst);
                    }
                    continue;
                }

                match status {
                    TxnState::Preparing => match executor.prepare(&txn) {
                        Ok(()) => {
                            txn.lock().status = TxnState::Committing;
                            // Re-enqueue for the commit pass; if the queue is
                            // saturated, commit in place rather than stall.
                            if queue.enqueue(txn.clone()).is_err() {
                                tracing::warn!(txn_id, "queue full, committing inline");
                                if executor.commit(&txn).is_err() {
                                    let _ = executor.abort(&txn);
                                }
                            }
                        }
                        Err(CoordinatorError::Timeout) => {
                            if matches!(executor.abort(&txn), Ok(true)) {
                                stats.timed_out.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                        Err(CoordinatorError::InvalidState(_)) => {
                            // A direct caller is already driving this
                            // transaction; leave it to them.
                            tracing::debug!(txn_id, "prepare already in progress, skipping");
                        }
                        Err(e) => {
                            tracing::debug!(txn_id, error = %e, "prepare failed, aborting");
                            let _ = executor.abort(&txn);
                        }
                    },
                    TxnState::Committing => {
                        if let Err(e) = executor.commit(&txn) {
                            tracing::warn!(txn_id, error = %e, "commit failed, aborting");
                            let _ = executor.abort(&txn);
                        }
                    }
                    // Terminal, or a direct caller is already driving it
                    _ => {}
                }

                std::thread::sleep(config.scheduler_idle);
            }
        })
        .expect("failed to spawn scheduler thread")
}

/// Sleep for `period` in short slices so `stop()` is not held up
pub(crate) fn pause(running: &AtomicBool, period: Duration) {
    let slice = Duration::from_millis(50);
    let deadline = Instant::now() + period;

    while running.load(Ordering::SeqCst) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        std::thread::sleep(remaining.min(slice));
    }
}

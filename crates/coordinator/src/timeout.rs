//! Timeout loop: deadline enforcement over the transaction registry

use crate::config::CoordinatorConfig;
use crate::queue::ScheduleQueue;
use crate::registry::TxnRegistry;
use crate::scheduler::pause;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// Start the timeout thread
///
/// Scans the registry every interval; any non-terminal transaction past its
/// deadline is moved to `Aborting` and handed back to the scheduler, which
/// performs the actual abort and statistics update. This loop never touches
/// the counters itself.
pub(crate) fn start(
    running: Arc<AtomicBool>,
    registry: Arc<TxnRegistry>,
    queue: Arc<ScheduleQueue>,
    config: CoordinatorConfig,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("txn-timeout".to_string())
        .spawn(move || {
            while running.load(Ordering::SeqCst) {
                let now = Instant::now();

                for txn in registry.snapshot() {
                    if !txn.is_expired(now) {
                        continue;
                    }
                    if txn.mark_aborting() {
                        tracing::info!(txn_id = txn.id(), "transaction expired");
                    }
                    // Hand expired work to the scheduler; a transaction
                    // already sitting in the queue is not duplicated.
                    if txn.status() == crate::transaction::TxnState::Aborting {
                        if let Err(e) = queue.enqueue(txn.clone()) {
                            tracing::warn!(txn_id = txn.id(), error = %e, "re-enqueue failed");
                        }
                    }
                }

                pause(&running, config.timeout_scan_interval);
            }
        })
        .expect("failed to spawn timeout thread")
}

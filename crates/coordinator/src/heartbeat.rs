//! Heartbeat loop: liveness probing of known nodes

use crate::config::CoordinatorConfig;
use crate::nodes::NodeTable;
use crate::scheduler::pause;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use strata_engine::Transport;
use strata_protocol::{messages::now_ms, TxnMessage};

/// Start the heartbeat thread
///
/// Every interval, sends a `HEARTBEAT` to each known node without waiting
/// for replies, then runs the health check that marks silent nodes dead.
pub(crate) fn start(
    running: Arc<AtomicBool>,
    coordinator_id: String,
    nodes: Arc<NodeTable>,
    transport: Arc<dyn Transport>,
    config: CoordinatorConfig,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("txn-heartbeat".to_string())
        .spawn(move || {
            while running.load(Ordering::SeqCst) {
                send_round(&coordinator_id, &nodes, transport.as_ref());

                for node_id in nodes.check_health(config.node_stale_after) {
                    tracing::warn!(node = %node_id, "node missed heartbeats, marked dead");
                }

                pause(&running, config.heartbeat_interval);
            }
        })
        .expect("failed to spawn heartbeat thread")
}

fn send_round(coordinator_id: &str, nodes: &NodeTable, transport: &dyn Transport) {
    for node in nodes.snapshot() {
        if node.node_id == coordinator_id {
            continue;
        }

        let body = serde_json::json!({
            "node_id": coordinator_id,
            "timestamp_ms": now_ms(),
        });
        let message = match TxnMessage::heartbeat(coordinator_id, node.node_id.clone())
            .with_payload(body.to_string().into_bytes())
        {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "failed to build heartbeat");
                continue;
            }
        };

        if let Err(e) = transport.send(&node.node_id, message) {
            tracing::debug!(node = %node.node_id, error = %e, "heartbeat send failed");
        }
    }
}

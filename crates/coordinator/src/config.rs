//! Coordinator tuning knobs

use std::time::Duration;

/// Configuration for the coordinator's queue bounds and loop periods
///
/// The defaults match the intervals the background loops are designed
/// around: a 1 s dequeue timeout bounds every scheduler iteration, the
/// heartbeat loop probes every 5 s, and a node is considered dead after
/// 30 s of silence.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Maximum number of transactions waiting to be scheduled
    pub queue_capacity: usize,

    /// How long `enqueue` may block on a full queue before `QueueFull`
    pub enqueue_wait: Duration,

    /// Scheduler dequeue timeout (upper bound on one idle iteration)
    pub dequeue_timeout: Duration,

    /// Sleep between scheduler iterations to bound busy-looping
    pub scheduler_idle: Duration,

    /// Interval between heartbeat rounds
    pub heartbeat_interval: Duration,

    /// Silence threshold after which a node is marked dead
    pub node_stale_after: Duration,

    /// Interval between deadline scans of the transaction registry
    pub timeout_scan_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            enqueue_wait: Duration::from_secs(5),
            dequeue_timeout: Duration::from_secs(1),
            scheduler_idle: Duration::from_millis(10),
            heartbeat_interval: Duration::from_secs(5),
            node_stale_after: Duration::from_secs(30),
            timeout_scan_interval: Duration::from_secs(1),
        }
    }
}

//! Bounded, blocking, priority-ordered schedule queue

use crate::error::{CoordinatorError, Result};
use crate::transaction::{DistributedTxn, Priority};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry {
    txn: Arc<DistributedTxn>,
    priority: Priority,
}

#[derive(Default)]
struct QueueInner {
    /// Head-first order: highest priority, oldest among equals
    entries: VecDeque<Entry>,
}

/// Bounded priority-then-FIFO queue of transactions awaiting scheduling
///
/// Producers block on `not_full` up to the enqueue wait budget; the
/// scheduler blocks on `not_empty` up to its dequeue timeout. A single
/// mutex guards the structure. Insertion is O(n), acceptable at
/// coordinator scale.
pub struct ScheduleQueue {
    capacity: usize,
    enqueue_wait: Duration,
    inner: Mutex<QueueInner>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl ScheduleQueue {
    pub fn new(capacity: usize, enqueue_wait: Duration) -> Self {
        Self {
            capacity,
            enqueue_wait,
            inner: Mutex::new(QueueInner::default()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Insert a transaction in priority-then-FIFO position
    ///
    /// Blocks while the queue is full, up to the enqueue wait budget, then
    /// fails with `QueueFull`. A transaction already sitting in the queue is
    /// not inserted twice; the call is a no-op.
    pub fn enqueue(&self, txn: Arc<DistributedTxn>) -> Result<()> {
        if !txn.try_mark_queued() {
            return Ok(());
        }

        let deadline = Instant::now() + self.enqueue_wait;
        let mut inner = self.inner.lock();

        while inner.entries.len() >= self.capacity {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                drop(inner);
                txn.clear_queued();
                return Err(CoordinatorError::QueueFull);
            }
            self.not_full.wait_for(&mut inner, remaining);
        }

        let priority = txn.priority();

        // First slot whose priority is strictly lower; equal priorities keep
        // arrival order.
        let pos = inner
            .entries
            .iter()
            .position(|e| e.priority < priority)
            .unwrap_or(inner.entries.len());
        inner.entries.insert(pos, Entry { txn, priority });

        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove and return the head, waiting up to `timeout` for one to appear
    pub fn dequeue(&self, timeout: Duration) -> Option<Arc<DistributedTxn>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();

        while inner.entries.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            self.not_empty.wait_for(&mut inner, remaining);
        }

        let entry = inner.entries.pop_front();
        if let Some(e) = &entry {
            // Must happen under the queue lock; a concurrent enqueue of the
            // same transaction checks this flag.
            e.txn.clear_queued();
        }
        self.not_full.notify_one();
        drop(inner);

        entry.map(|e| e.txn)
    }

    /// Current number of queued transactions
    pub fn size(&self) -> usize {
        self.inner.lock().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_engine::LocalTxn;

    fn txn(id: u64, priority: Priority) -> Arc<DistributedTxn> {
        Arc::new(DistributedTxn::new(
            id,
            "coord",
            priority,
            Duration::from_secs(30),
            vec!["node-1".to_string()],
            LocalTxn(id),
        ))
    }

    #[test]
    fn dequeue_order_respects_priority() {
        let queue = ScheduleQueue::new(16, Duration::from_millis(10));

        queue.enqueue(txn(1, Priority::Low)).unwrap();
        queue.enqueue(txn(2, Priority::High)).unwrap();
        queue.enqueue(txn(3, Priority::Urgent)).unwrap();
        queue.enqueue(txn(4, Priority::Normal)).unwrap();

        let order: Vec<u64> = (0..4)
            .map(|_| queue.dequeue(Duration::from_millis(10)).unwrap().id())
            .collect();
        assert_eq!(order, vec![3, 2, 4, 1]);
    }

    #[test]
    fn equal_priorities_are_fifo() {
        let queue = ScheduleQueue::new(16, Duration::from_millis(10));

        for id in 1..=3 {
            queue.enqueue(txn(id, Priority::Normal)).unwrap();
        }

        for expected in 1..=3 {
            let got = queue.dequeue(Duration::from_millis(10)).unwrap();
            assert_eq!(got.id(), expected);
        }
    }

    #[test]
    fn dequeue_times_out_on_empty_queue() {
        let queue = ScheduleQueue::new(4, Duration::from_millis(10));
        let started = Instant::now();
        assert!(queue.dequeue(Duration::from_millis(50)).is_none());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn full_queue_rejects_after_wait_budget() {
        let queue = ScheduleQueue::new(2, Duration::from_millis(50));
        queue.enqueue(txn(1, Priority::Normal)).unwrap();
        queue.enqueue(txn(2, Priority::Normal)).unwrap();

        let err = queue.enqueue(txn(3, Priority::Normal)).unwrap_err();
        assert!(matches!(err, CoordinatorError::QueueFull));
        assert_eq!(queue.size(), 2);
    }

    #[test]
    fn blocked_producer_succeeds_after_dequeue() {
        let queue = Arc::new(ScheduleQueue::new(1, Duration::from_secs(5)));
        queue.enqueue(txn(1, Priority::Normal)).unwrap();

        let producer = {
            let queue = queue.clone();
            std::thread::spawn(move || queue.enqueue(txn(2, Priority::Normal)))
        };

        // Give the producer time to block on the full queue
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.size(), 1);

        let head = queue.dequeue(Duration::from_millis(100)).unwrap();
        assert_eq!(head.id(), 1);

        producer.join().unwrap().unwrap();
        assert_eq!(queue.size(), 1);
        assert_eq!(queue.dequeue(Duration::from_millis(100)).unwrap().id(), 2);
    }

    #[test]
    fn duplicate_enqueue_is_a_no_op() {
        let queue = ScheduleQueue::new(4, Duration::from_millis(10));
        let t = txn(1, Priority::Normal);

        queue.enqueue(t.clone()).unwrap();
        queue.enqueue(t.clone()).unwrap();
        assert_eq!(queue.size(), 1);

        // After a dequeue the slot is free again
        queue.dequeue(Duration::from_millis(10)).unwrap();
        queue.enqueue(t).unwrap();
        assert_eq!(queue.size(), 1);
    }
}

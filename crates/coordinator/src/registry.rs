//! In-flight transaction registry

use crate::transaction::DistributedTxn;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Sole owner of all in-flight transactions, keyed by global transaction id
///
/// Everything else (queue, scheduler, callers) holds `Arc` handles borrowed
/// from here. Transactions stay registered after reaching a terminal state
/// so their outcome remains inspectable until the coordinator is dropped.
#[derive(Default)]
pub(crate) struct TxnRegistry {
    txns: Mutex<HashMap<u64, Arc<DistributedTxn>>>,
}

impl TxnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, txn: Arc<DistributedTxn>) {
        self.txns.lock().insert(txn.id(), txn);
    }

    /// Drop a transaction that never made it into the schedule queue
    pub fn remove(&self, txn_id: u64) -> Option<Arc<DistributedTxn>> {
        self.txns.lock().remove(&txn_id)
    }

    pub fn get(&self, txn_id: u64) -> Option<Arc<DistributedTxn>> {
        self.txns.lock().get(&txn_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.txns.lock().len()
    }

    /// Handles to every registered transaction, for iteration off-lock
    pub fn snapshot(&self) -> Vec<Arc<DistributedTxn>> {
        self.txns.lock().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Priority;
    use std::time::Duration;
    use strata_engine::LocalTxn;

    fn txn(id: u64) -> Arc<DistributedTxn> {
        Arc::new(DistributedTxn::new(
            id,
            "coord",
            Priority::Normal,
            Duration::from_secs(30),
            vec!["node-1".to_string()],
            LocalTxn(id),
        ))
    }

    #[test]
    fn registry_owns_and_serves_handles() {
        let registry = TxnRegistry::new();
        registry.insert(txn(1));
        registry.insert(txn(2));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(1).unwrap().id(), 1);
        assert!(registry.get(99).is_none());

        assert!(registry.remove(2).is_some());
        assert_eq!(registry.len(), 1);
    }
}

//! Registry of known participant nodes with liveness metadata

use crate::error::{CoordinatorError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A known cluster node
///
/// Owned exclusively by the [`NodeTable`]; copies handed out for messaging
/// are plain values.
#[derive(Debug, Clone)]
pub struct Node {
    pub node_id: String,
    pub address: String,
    pub port: u16,
    pub is_coordinator: bool,
    pub is_alive: bool,
    pub last_heartbeat: Instant,
}

/// Table of known nodes under a single mutex
///
/// Cluster scale is tens of nodes, so a flat map with full scans in the
/// health check is sufficient.
#[derive(Default)]
pub struct NodeTable {
    nodes: Mutex<HashMap<String, Node>>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node; fails if the id is already present
    pub fn add_node(
        &self,
        node_id: impl Into<String>,
        address: impl Into<String>,
        port: u16,
    ) -> Result<()> {
        let node_id = node_id.into();
        let mut nodes = self.nodes.lock();

        if nodes.contains_key(&node_id) {
            return Err(CoordinatorError::InvalidArgument(format!(
                "node already registered: {node_id}"
            )));
        }

        nodes.insert(
            node_id.clone(),
            Node {
                node_id,
                address: address.into(),
                port,
                is_coordinator: false,
                is_alive: true,
                last_heartbeat: Instant::now(),
            },
        );
        Ok(())
    }

    /// Remove a node; fails if the id is unknown
    pub fn remove_node(&self, node_id: &str) -> Result<()> {
        if self.nodes.lock().remove(node_id).is_none() {
            return Err(CoordinatorError::NodeUnavailable(node_id.to_string()));
        }
        Ok(())
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.lock().contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.lock().is_empty()
    }

    /// Look up a node by id, as a value copy
    pub fn get(&self, node_id: &str) -> Option<Node> {
        self.nodes.lock().get(node_id).cloned()
    }

    /// Value copies of all known nodes, for iteration outside the lock
    pub fn snapshot(&self) -> Vec<Node> {
        self.nodes.lock().values().cloned().collect()
    }

    /// Refresh liveness for a node that sent a heartbeat
    ///
    /// Returns false if the sender is unknown.
    pub fn record_heartbeat(&self, node_id: &str) -> bool {
        let mut nodes = self.nodes.lock();
        match nodes.get_mut(node_id) {
            Some(node) => {
                node.last_heartbeat = Instant::now();
                node.is_alive = true;
                true
            }
            None => false,
        }
    }

    /// Clear `is_alive` for nodes silent longer than `stale_after`
    ///
    /// Returns the ids that flipped from alive to dead in this pass.
    pub fn check_health(&self, stale_after: Duration) -> Vec<String> {
        let now = Instant::now();
        let mut newly_dead = Vec::new();

        for node in self.nodes.lock().values_mut() {
            if node.is_alive && now.duration_since(node.last_heartbeat) > stale_after {
                node.is_alive = false;
                newly_dead.push(node.node_id.clone());
            }
        }
        newly_dead
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_add_is_rejected() {
        let table = NodeTable::new();
        table.add_node("node-1", "127.0.0.1", 7400).unwrap();
        assert!(table.add_node("node-1", "127.0.0.1", 7401).is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn removing_unknown_node_fails() {
        let table = NodeTable::new();
        assert!(matches!(
            table.remove_node("ghost"),
            Err(CoordinatorError::NodeUnavailable(_))
        ));

        table.add_node("node-1", "127.0.0.1", 7400).unwrap();
        table.remove_node("node-1").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn stale_nodes_are_marked_dead_and_revived_by_heartbeat() {
        let table = NodeTable::new();
        table.add_node("node-1", "127.0.0.1", 7400).unwrap();

        // Fresh node survives the health check
        assert!(table.check_health(Duration::from_secs(30)).is_empty());
        assert!(table.get("node-1").unwrap().is_alive);

        // With a zero threshold any node is stale
        std::thread::sleep(Duration::from_millis(5));
        let dead = table.check_health(Duration::ZERO);
        assert_eq!(dead, vec!["node-1".to_string()]);
        assert!(!table.get("node-1").unwrap().is_alive);

        // Second pass reports nothing new
        assert!(table.check_health(Duration::ZERO).is_empty());

        // A heartbeat brings it back
        assert!(table.record_heartbeat("node-1"));
        assert!(table.get("node-1").unwrap().is_alive);
    }

    #[test]
    fn heartbeat_from_unknown_sender_is_reported() {
        let table = NodeTable::new();
        assert!(!table.record_heartbeat("ghost"));
    }
}

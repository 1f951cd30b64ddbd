//! In-process message bus for wiring a coordinator to test participants

use crate::{EngineError, Result, Transport};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use strata_protocol::TxnMessage;

/// Handler invoked when a message is delivered to a registered node
pub type MessageHandler = Arc<dyn Fn(TxnMessage) + Send + Sync>;

/// In-process message router
///
/// Each node registers a handler under its id; `send` routes the message to
/// the receiver's handler on the calling thread. Handlers run outside the
/// routing lock, so a handler may itself call `send` (e.g. a participant
/// replying to a prepare).
#[derive(Default)]
pub struct MemoryBus {
    handlers: Mutex<HashMap<String, MessageHandler>>,
}

impl MemoryBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node's inbound message handler, replacing any previous one
    pub fn register<F>(&self, node_id: impl Into<String>, handler: F)
    where
        F: Fn(TxnMessage) + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .insert(node_id.into(), Arc::new(handler));
    }

    /// Remove a node's handler, making it unreachable
    pub fn unregister(&self, node_id: &str) {
        self.handlers.lock().remove(node_id);
    }
}

impl Transport for MemoryBus {
    fn send(&self, node_id: &str, message: TxnMessage) -> Result<()> {
        // Clone the handler out so it runs without the lock held; handlers
        // are allowed to send messages of their own.
        let handler = self.handlers.lock().get(node_id).cloned();

        match handler {
            Some(handler) => {
                handler(message);
                Ok(())
            }
            None => Err(EngineError::NodeUnreachable(node_id.to_string())),
        }
    }
}

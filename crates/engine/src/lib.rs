//! External collaborator boundaries for the distributed transaction layer
//!
//! The coordinator talks to the outside world through two narrow contracts:
//! a [`Transport`] that delivers messages to remote nodes, and a
//! [`LocalStore`] that manages the node's own single-node transactions.
//! This crate defines both traits plus in-memory implementations
//! ([`MemoryBus`], [`MemoryStore`]) used by tests and demos.

use thiserror::Error;

pub mod bus;
pub mod store;

pub use bus::MemoryBus;
pub use store::{IsolationLevel, LocalTxn, MemoryStore};

use strata_protocol::TxnMessage;

/// Engine-boundary errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("node unreachable: {0}")]
    NodeUnreachable(String),

    #[error("unknown local transaction: {0}")]
    UnknownTransaction(u64),

    #[error("send failed: {0}")]
    SendFailed(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Outbound message delivery hook
///
/// The coordinator never opens sockets; every outbound message goes through
/// this trait. Implementations must be safe to call from multiple threads.
pub trait Transport: Send + Sync {
    /// Deliver a message to the named node
    fn send(&self, node_id: &str, message: TxnMessage) -> Result<()>;
}

/// Single-node transaction manager boundary
///
/// The coordinator treats the node's own durable state as a black box: it
/// opens a local transaction when a distributed transaction begins, and
/// commits or rolls it back with the global decision.
pub trait LocalStore: Send + Sync {
    /// Open a local transaction at the given isolation level
    fn begin(&self, isolation: IsolationLevel) -> Result<LocalTxn>;

    /// Commit a local transaction; `Ok(false)` means the commit was refused
    fn commit(&self, txn: LocalTxn) -> Result<bool>;

    /// Roll back a local transaction
    fn rollback(&self, txn: LocalTxn) -> Result<()>;
}

//! Wire-level message types for distributed transaction coordination
//!
//! This crate defines the typed messages exchanged between a transaction
//! coordinator and its participants: prepare/commit/abort control messages,
//! their acknowledgements, and liveness heartbeats. Transport is out of
//! scope; messages are plain data handed to a pluggable send hook.

use thiserror::Error;

pub mod messages;

pub use messages::{MessageType, TxnMessage, MAX_PAYLOAD_BYTES};

/// Errors from parsing or constructing wire messages
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid message type: {0}")]
    InvalidMessageType(String),

    #[error("payload exceeds {MAX_PAYLOAD_BYTES} bytes: {0}")]
    PayloadTooLarge(usize),

    #[error("invalid transaction id: {0}")]
    InvalidTransactionId(String),
}

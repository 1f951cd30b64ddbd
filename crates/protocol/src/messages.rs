//! Typed messages for coordinator-to-participant communication

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum payload size carried by a single message
pub const MAX_PAYLOAD_BYTES: usize = 512;

/// Message types in the 2PC protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Prepare phase (vote request)
    Prepare,
    /// Participant voted to commit
    PrepareOk,
    /// Participant voted to abort
    PrepareFail,
    /// Commit decision
    Commit,
    /// Commit acknowledged
    CommitOk,
    /// Abort decision
    Abort,
    /// Abort acknowledged
    AbortOk,
    /// Liveness probe
    Heartbeat,
    /// Recovery request after coordinator restart
    Recovery,
}

impl MessageType {
    /// Parse from string header value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "prepare" => Some(Self::Prepare),
            "prepare_ok" => Some(Self::PrepareOk),
            "prepare_fail" => Some(Self::PrepareFail),
            "commit" => Some(Self::Commit),
            "commit_ok" => Some(Self::CommitOk),
            "abort" => Some(Self::Abort),
            "abort_ok" => Some(Self::AbortOk),
            "heartbeat" => Some(Self::Heartbeat),
            "recovery" => Some(Self::Recovery),
            _ => None,
        }
    }

    /// Convert to string header value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::PrepareOk => "prepare_ok",
            Self::PrepareFail => "prepare_fail",
            Self::Commit => "commit",
            Self::CommitOk => "commit_ok",
            Self::Abort => "abort",
            Self::AbortOk => "abort_ok",
            Self::Heartbeat => "heartbeat",
            Self::Recovery => "recovery",
        }
    }

    /// Whether this message is a reply to a control message
    pub fn is_ack(&self) -> bool {
        matches!(
            self,
            Self::PrepareOk | Self::PrepareFail | Self::CommitOk | Self::AbortOk
        )
    }
}

/// A message that flows between coordinator and participants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxnMessage {
    /// Message type
    pub message_type: MessageType,

    /// Global transaction id this message belongs to (0 for heartbeats)
    pub global_txn_id: u64,

    /// Sending node id
    pub sender_id: String,

    /// Receiving node id
    pub receiver_id: String,

    /// Milliseconds since the unix epoch at send time
    pub timestamp_ms: u64,

    /// Transaction timeout budget, forwarded so participants can expire early
    pub timeout_ms: u64,

    /// Serialized body (operation data, heartbeat view, ...)
    pub payload: Vec<u8>,
}

impl TxnMessage {
    /// Create a new message with an empty payload
    pub fn new(
        message_type: MessageType,
        global_txn_id: u64,
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
    ) -> Self {
        Self {
            message_type,
            global_txn_id,
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            timestamp_ms: now_ms(),
            timeout_ms: 0,
            payload: Vec::new(),
        }
    }

    /// Create a heartbeat message (not tied to any transaction)
    pub fn heartbeat(sender_id: impl Into<String>, receiver_id: impl Into<String>) -> Self {
        Self::new(MessageType::Heartbeat, 0, sender_id, receiver_id)
    }

    /// Set the timeout budget
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Attach a payload, enforcing the size cap
    pub fn with_payload(mut self, payload: Vec<u8>) -> Result<Self, ParseError> {
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(ParseError::PayloadTooLarge(payload.len()));
        }
        self.payload = payload;
        Ok(self)
    }

    /// Build the reply to a vote request or decision message
    ///
    /// Swaps sender and receiver and keeps the transaction id.
    pub fn reply(&self, message_type: MessageType) -> Self {
        Self::new(
            message_type,
            self.global_txn_id,
            self.receiver_id.clone(),
            self.sender_id.clone(),
        )
    }

    /// Render the envelope as string headers; the payload travels separately
    pub fn to_headers(&self) -> HashMap<String, String> {
        HashMap::from([
            ("message_type".to_string(), self.message_type.as_str().to_string()),
            ("global_txn_id".to_string(), self.global_txn_id.to_string()),
            ("sender_id".to_string(), self.sender_id.clone()),
            ("receiver_id".to_string(), self.receiver_id.clone()),
            ("timestamp_ms".to_string(), self.timestamp_ms.to_string()),
            ("timeout_ms".to_string(), self.timeout_ms.to_string()),
        ])
    }

    /// Rebuild a message from string headers and a payload
    ///
    /// `message_type`, `global_txn_id`, `sender_id`, and `receiver_id` are
    /// required; the timing headers default to send time and no timeout.
    pub fn from_headers(
        headers: &HashMap<String, String>,
        payload: Vec<u8>,
    ) -> Result<Self, ParseError> {
        let field = |name: &'static str| {
            headers
                .get(name)
                .ok_or(ParseError::MissingField(name))
        };

        let raw_type = field("message_type")?;
        let message_type = MessageType::parse(raw_type)
            .ok_or_else(|| ParseError::InvalidMessageType(raw_type.clone()))?;

        let raw_id = field("global_txn_id")?;
        let global_txn_id = raw_id
            .parse::<u64>()
            .map_err(|_| ParseError::InvalidTransactionId(raw_id.clone()))?;

        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(ParseError::PayloadTooLarge(payload.len()));
        }

        Ok(Self {
            message_type,
            global_txn_id,
            sender_id: field("sender_id")?.clone(),
            receiver_id: field("receiver_id")?.clone(),
            timestamp_ms: headers
                .get("timestamp_ms")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(now_ms),
            timeout_ms: headers
                .get("timeout_ms")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            payload,
        })
    }
}

/// Current wall-clock time in milliseconds since the unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

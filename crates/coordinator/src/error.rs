//! Error types for the coordinator

use thiserror::Error;

/// Coordinator error types
///
/// All failures are transaction-scoped; nothing here is fatal to the
/// process. Per-participant failures are absorbed inside an operation and
/// surface only through the aggregate outcome.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid transaction state: {0}")]
    InvalidState(String),

    #[error("operation timed out")]
    Timeout,

    #[error("prepare phase failed: {prepared} of {total} participants prepared")]
    PrepareFailed { prepared: usize, total: usize },

    #[error("commit phase failed: {0}")]
    CommitFailed(String),

    #[error("abort phase failed: {0}")]
    AbortFailed(String),

    #[error("node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("schedule queue is full")]
    QueueFull,

    /// Reserved for participant-side lock managers; never raised here
    #[error("deadlock detected")]
    Deadlock,

    #[error("engine error: {0}")]
    Engine(#[from] strata_engine::EngineError),
}

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, CoordinatorError>;

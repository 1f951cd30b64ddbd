//! Two-phase-commit coordinator for a distributed key-value store
//!
//! This crate is the transaction-coordination core of the distributed
//! layer: it runs 2PC across remote participants, schedules transactions by
//! priority under bounded concurrency, and enforces deadlines and liveness
//! in the presence of slow or unreachable participants.
//!
//! The coordinator owns three long-running threads once started:
//!
//! - the **scheduler** pops transactions off the bounded priority queue and
//!   drives them through prepare and commit;
//! - the **heartbeat** loop probes every known node and marks silent ones
//!   dead;
//! - the **timeout** loop expires transactions past their deadline and
//!   hands them back to the scheduler for the abort.
//!
//! Transport and local storage are external collaborators behind the
//! `Transport` and `LocalStore` traits from `strata-engine`; the
//! coordinator never opens sockets and treats the node's own durable state
//! as a black box.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod nodes;
pub mod queue;
pub mod transaction;

mod executor;
mod heartbeat;
mod registry;
mod scheduler;
mod stats;
mod timeout;
mod votes;

pub use config::CoordinatorConfig;
pub use coordinator::{Coordinator, SchedulePolicy};
pub use error::{CoordinatorError, Result};
pub use nodes::{Node, NodeTable};
pub use queue::ScheduleQueue;
pub use stats::CoordinatorStats;
pub use transaction::{DistributedTxn, Participant, Priority, TxnState};
pub use votes::Vote;

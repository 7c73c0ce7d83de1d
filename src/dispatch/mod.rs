//! Submission coordination.
//!
//! The [`Dispatcher`] ties together the response conduit arbiter, the waiter
//! registry and the live counters that make task results findable by their
//! submitters.

pub mod conduits;
pub mod dispatcher;
pub mod stats;
pub mod waiters;

pub use conduits::ResponseConduits;
pub use dispatcher::Dispatcher;
pub use stats::{StatsSnapshot, TaskStats};
pub use waiters::{WaiterEntry, WaiterRegistry};

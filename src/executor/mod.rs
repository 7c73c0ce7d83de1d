//! Task execution infrastructure.
//!
//! The contract callers implement ([`Task`]), the single-consumer [`Worker`]
//! and the dual-lane [`WorkerPool`] that routes each task to the least-loaded
//! worker of the matching kind.

pub mod pool;
pub mod task;
pub mod worker;

pub use pool::WorkerPool;
pub use task::{Response, ResponseReceiver, ResponseSender, Task, TaskStatus};
pub use worker::Worker;

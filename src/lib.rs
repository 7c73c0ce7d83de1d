//! taskmill - in-process task execution service
//!
//! A thread-pool-and-dispatcher engine: callers implement the [`Task`] trait
//! and hand boxed tasks to an [`ExecutionService`]. Each task is routed to a
//! worker drawn from one of two pools (one for blocking submitters, one for
//! fire-and-forget submitters) and its result travels back over a small fixed
//! set of shared bounded conduits, where a per-conduit reader correlates it
//! with the waiting submitter. Live counters are exposed for monitoring.
//!
//! # Quick Start
//!
//! ```no_run
//! use taskmill::prelude::*;
//!
//! struct Sleepy {
//!     id: i64,
//!     conduit: Option<ResponseSender>,
//! }
//!
//! impl Task for Sleepy {
//!     fn id(&self) -> i64 {
//!         self.id
//!     }
//!
//!     fn is_blocking(&self) -> bool {
//!         true
//!     }
//!
//!     fn execute(&mut self) -> Response {
//!         std::thread::sleep(std::time::Duration::from_micros(50));
//!         Response::completed(self.id)
//!     }
//!
//!     fn set_response_conduit(&mut self, conduit: ResponseSender) {
//!         self.conduit = Some(conduit);
//!     }
//!
//!     fn response_conduit(&self) -> Option<&ResponseSender> {
//!         self.conduit.as_ref()
//!     }
//! }
//!
//! fn main() -> taskmill::Result<()> {
//!     let mut service = ExecutionService::from_config(ServiceConfig::default())?;
//!     service.start()?;
//!
//!     // a blocking submit waits inline and returns the result
//!     let response = service.submit(Box::new(Sleepy { id: 1, conduit: None }))?;
//!     assert_eq!(response.unwrap().status, TaskStatus::CompletedOk);
//!
//!     service.stop();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod logging;
pub mod monitor;
pub mod prelude;
pub mod service;
pub mod sync;

// Re-export key types at crate root
pub use config::{LogSettings, ServiceConfig};
pub use error::{Error, Result};
pub use executor::{Response, Task, TaskStatus};
pub use service::ExecutionService;

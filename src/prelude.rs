//! Convenience re-exports for typical users of the service.

pub use crate::config::{LogSettings, ServiceConfig};
pub use crate::error::{Error, Result};
pub use crate::executor::{Response, ResponseReceiver, ResponseSender, Task, TaskStatus};
pub use crate::monitor::{Monitor, Monitored};
pub use crate::service::ExecutionService;

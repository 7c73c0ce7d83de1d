//! Error types for the taskmill service.

/// Result type alias for taskmill operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while submitting work to or running the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The submitted task was rejected before any state was touched
    #[error("invalid task: {0}")]
    InvalidTask(String),

    /// Submission reached a worker that has not been started (or was stopped)
    #[error("worker is not started")]
    NotStarted,

    /// The selected worker's intake queue is at capacity
    #[error("cannot submit, worker already has accepted the maximum number of tasks")]
    QueueFull,

    /// Every response conduit is at capacity and the dispatcher is not waiting
    #[error("cannot submit, no response conduit available")]
    NoConduitAvailable,

    /// A broadcast was requested while receipts from an earlier one are outstanding
    #[error("earlier broadcast not complete")]
    BroadcastBusy,

    /// Worker lifecycle error
    #[error("worker error: {0}")]
    Worker(String),

    /// Service lifecycle error
    #[error("service error: {0}")]
    Service(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid-task error
    pub fn invalid_task<S: Into<String>>(msg: S) -> Self {
        Error::InvalidTask(msg.into())
    }

    /// Create a worker error
    pub fn worker<S: Into<String>>(msg: S) -> Self {
        Error::Worker(msg.into())
    }

    /// Create a service error
    pub fn service<S: Into<String>>(msg: S) -> Self {
        Error::Service(msg.into())
    }

    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }
}

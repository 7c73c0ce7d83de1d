//! Task contract and execution results.

/// Sending half of a response conduit. Attached to a task by the dispatcher
/// so the executing worker knows where to publish the result.
pub type ResponseSender = crossbeam_channel::Sender<Response>;

/// Receiving half of a response conduit.
pub type ResponseReceiver = crossbeam_channel::Receiver<Response>;

/// Outcome of a task as it moves through the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// The task has not been handed to the service yet
    NotSubmitted,
    /// The dispatcher could not hand the task to a worker
    FailedToSubmit,
    /// The task is queued or executing
    Submitted,
    /// Execution finished without error
    CompletedOk,
    /// Execution reported a failure (or panicked)
    CompletedFailed,
}

impl TaskStatus {
    /// Numeric wire code for this status.
    pub fn code(self) -> u16 {
        match self {
            TaskStatus::NotSubmitted => 0,
            TaskStatus::FailedToSubmit => 1,
            TaskStatus::Submitted => 100,
            TaskStatus::CompletedOk => 200,
            TaskStatus::CompletedFailed => 500,
        }
    }
}

/// Result of one task execution, published on the task's response conduit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Id of the task this response corresponds to
    pub task_id: i64,
    /// Whether the task succeeded, failed or never ran
    pub status: TaskStatus,
    /// Output of a successfully executed task, by convention a JSON string
    pub result: String,
    /// Error descriptors accumulated during execution, in order
    pub errors: Vec<String>,
}

impl Response {
    /// New response in the not-submitted state.
    pub fn new(task_id: i64) -> Self {
        Response {
            task_id,
            status: TaskStatus::NotSubmitted,
            result: String::new(),
            errors: Vec::new(),
        }
    }

    /// Response for a task that finished cleanly.
    pub fn completed(task_id: i64) -> Self {
        Response {
            status: TaskStatus::CompletedOk,
            ..Response::new(task_id)
        }
    }

    /// Response for a task the pool refused to accept.
    pub fn failed_to_submit(task_id: i64) -> Self {
        Response {
            status: TaskStatus::FailedToSubmit,
            ..Response::new(task_id)
        }
    }

    /// Response for a task whose execution failed with the given error.
    pub fn failed<S: Into<String>>(task_id: i64, error: S) -> Self {
        Response {
            status: TaskStatus::CompletedFailed,
            errors: vec![error.into()],
            ..Response::new(task_id)
        }
    }
}

/// Contract callers implement to get work executed by the service.
///
/// A task carries a stable integer id, declares whether its submitter blocks
/// for the result, and holds the response conduit the dispatcher assigns to
/// it. The executing worker publishes the value returned by [`Task::execute`]
/// on that conduit.
pub trait Task: Send {
    /// Stable identifier, unique among in-flight tasks.
    fn id(&self) -> i64;

    /// Whether the submitter waits inline for the result.
    fn is_blocking(&self) -> bool;

    /// Run the work and report its outcome.
    fn execute(&mut self) -> Response;

    /// Called by the dispatcher to attach the assigned response conduit.
    fn set_response_conduit(&mut self, conduit: ResponseSender);

    /// The conduit this task reports back on, if one has been assigned.
    fn response_conduit(&self) -> Option<&ResponseSender>;
}

//! Shared test task and helpers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};
use taskmill::executor::{Response, ResponseSender, Task};

static NEXT_TASK_ID: AtomicI64 = AtomicI64::new(1);

/// Caller-side task that sleeps for a configurable duration and reports
/// success, the smallest useful [`Task`] implementation.
pub struct SleepTask {
    id: i64,
    blocking: bool,
    exec_duration: Duration,
    conduit: Option<ResponseSender>,
}

impl SleepTask {
    pub fn new(exec_micros: u64, blocking: bool) -> Self {
        SleepTask {
            id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
            blocking,
            exec_duration: Duration::from_micros(exec_micros),
            conduit: None,
        }
    }

    pub fn task_id(&self) -> i64 {
        self.id
    }
}

impl Task for SleepTask {
    fn id(&self) -> i64 {
        self.id
    }

    fn is_blocking(&self) -> bool {
        self.blocking
    }

    fn execute(&mut self) -> Response {
        std::thread::sleep(self.exec_duration);
        Response::completed(self.id)
    }

    fn set_response_conduit(&mut self, conduit: ResponseSender) {
        self.conduit = Some(conduit);
    }

    fn response_conduit(&self) -> Option<&ResponseSender> {
        self.conduit.as_ref()
    }
}

/// Poll `check` every millisecond until it holds or `timeout` elapses.
pub fn wait_until<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    check()
}

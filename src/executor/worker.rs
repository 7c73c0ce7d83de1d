//! Single-consumer worker with a bounded intake queue.

use crate::config::ExecutorSettings;
use crate::error::{Error, Result};
use crate::executor::task::{Response, Task};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A worker executes one task at a time, pulled from its own bounded intake
/// queue, and publishes each result on the task's assigned response conduit.
pub struct Worker {
    name: String,
    queue_capacity: usize,
    wait_for_availability: AtomicBool,
    running: Arc<AtomicBool>,
    intake: Mutex<Option<Sender<Box<dyn Task>>>>,
    consumer: Option<JoinHandle<()>>,
}

impl Worker {
    /// New stopped worker. `start` must be called before tasks are accepted.
    pub fn new(cfg: &ExecutorSettings, name: String) -> Self {
        Worker {
            name,
            queue_capacity: cfg.task_queue_capacity,
            wait_for_availability: AtomicBool::new(cfg.wait_for_availability),
            running: Arc::new(AtomicBool::new(false)),
            intake: Mutex::new(None),
            consumer: None,
        }
    }

    /// Allocate the intake queue and spawn the consumer thread.
    pub fn start(&mut self) -> Result<()> {
        if self.consumer.is_some() {
            return Err(Error::worker(format!("{} already started", self.name)));
        }

        let (tx, rx) = bounded::<Box<dyn Task>>(self.queue_capacity);
        *self.intake.lock() = Some(tx);
        self.running.store(true, Ordering::Release);

        let running = Arc::clone(&self.running);
        let thread = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || Self::run(running, rx))
            .map_err(|e| Error::worker(format!("spawn failed: {}", e)))?;
        self.consumer = Some(thread);

        Ok(())
    }

    // main loop
    fn run(running: Arc<AtomicBool>, intake: Receiver<Box<dyn Task>>) {
        while running.load(Ordering::Acquire) {
            let mut task = match intake.recv() {
                Ok(task) => task,
                // intake closed, nothing more will arrive
                Err(_) => break,
            };

            let task_id = task.id();
            let conduit = match task.response_conduit() {
                Some(conduit) => conduit.clone(),
                None => {
                    // Every task is expected to carry a conduit, at least for
                    // the housekeeping side. Without one the result has
                    // nowhere to go, so drop the task.
                    tracing::error!(task_id, "task has no response conduit, dropping");
                    continue;
                }
            };

            let mut response = match catch_unwind(AssertUnwindSafe(|| task.execute())) {
                Ok(response) => response,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(task_id, error = message, "task panicked during execution");
                    Response::failed(task_id, message)
                }
            };
            // task implementations may forget to set the id
            response.task_id = task_id;

            if conduit.send(response).is_err() {
                tracing::warn!(task_id, "response conduit closed before result delivery");
            }
        }
        tracing::debug!("worker exiting");
    }

    /// Queue a task for execution.
    ///
    /// With `wait_for_availability` set the call blocks until the intake
    /// queue has room; otherwise a full queue fails with [`Error::QueueFull`].
    pub fn submit(&self, task: Box<dyn Task>) -> Result<()> {
        if !self.running.load(Ordering::Acquire) {
            return Err(Error::NotStarted);
        }
        let sender = match self.intake.lock().as_ref() {
            Some(sender) => sender.clone(),
            None => return Err(Error::NotStarted),
        };

        if self.wait_for_availability.load(Ordering::Acquire) {
            sender.send(task).map_err(|_| Error::NotStarted)?;
        } else {
            sender.try_send(task).map_err(|e| match e {
                TrySendError::Full(_) => Error::QueueFull,
                TrySendError::Disconnected(_) => Error::NotStarted,
            })?;
        }
        Ok(())
    }

    /// Number of tasks currently queued (not counting one mid-execution).
    pub fn in_queue(&self) -> usize {
        self.intake
            .lock()
            .as_ref()
            .map(|sender| sender.len())
            .unwrap_or(0)
    }

    /// Switch the submit path between blocking and fail-fast.
    pub fn set_wait_for_availability(&self, wait: bool) {
        self.wait_for_availability.store(wait, Ordering::Release);
    }

    /// Whether the consumer loop is accepting tasks.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Close the intake queue and join the consumer thread. Tasks still in
    /// the queue are dropped; a task mid-execution completes first.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.intake.lock().take();
        if let Some(thread) = self.consumer.take() {
            let _ = thread.join();
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("queue_capacity", &self.queue_capacity)
            .field("running", &self.is_running())
            .field("in_queue", &self.in_queue())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::task::{ResponseSender, TaskStatus};
    use std::time::Duration;

    struct SleepTask {
        id: i64,
        sleep: Duration,
        conduit: Option<ResponseSender>,
        panic: bool,
    }

    impl SleepTask {
        fn new(id: i64, sleep_micros: u64) -> Self {
            SleepTask {
                id,
                sleep: Duration::from_micros(sleep_micros),
                conduit: None,
                panic: false,
            }
        }
    }

    impl Task for SleepTask {
        fn id(&self) -> i64 {
            self.id
        }

        fn is_blocking(&self) -> bool {
            false
        }

        fn execute(&mut self) -> Response {
            if self.panic {
                panic!("intentional test panic");
            }
            std::thread::sleep(self.sleep);
            // leave task_id unset so the worker has to correct it
            Response::completed(0)
        }

        fn set_response_conduit(&mut self, conduit: ResponseSender) {
            self.conduit = Some(conduit);
        }

        fn response_conduit(&self) -> Option<&ResponseSender> {
            self.conduit.as_ref()
        }
    }

    fn test_cfg(capacity: usize, wait: bool) -> ExecutorSettings {
        ExecutorSettings {
            task_queue_capacity: capacity,
            wait_for_availability: wait,
        }
    }

    #[test]
    fn test_submit_before_start_fails() {
        let worker = Worker::new(&test_cfg(2, false), "w-test".into());
        let err = worker.submit(Box::new(SleepTask::new(1, 0))).unwrap_err();
        assert!(matches!(err, Error::NotStarted));
    }

    #[test]
    fn test_executes_and_corrects_task_id() {
        let mut worker = Worker::new(&test_cfg(2, false), "w-test".into()).into_started();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut task = SleepTask::new(42, 10);
        task.set_response_conduit(tx);
        worker.submit(Box::new(task)).unwrap();

        let response = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(response.task_id, 42);
        assert_eq!(response.status, TaskStatus::CompletedOk);
        worker.stop();
    }

    #[test]
    fn test_queue_full_without_wait() {
        let mut worker = Worker::new(&test_cfg(1, false), "w-test".into()).into_started();
        let (tx, rx) = crossbeam_channel::bounded(4);

        // first task occupies the consumer for a while
        let mut long = SleepTask::new(1, 50_000);
        long.set_response_conduit(tx.clone());
        worker.submit(Box::new(long)).unwrap();
        // give the consumer time to pull it off the queue
        std::thread::sleep(Duration::from_millis(5));

        let mut queued = SleepTask::new(2, 0);
        queued.set_response_conduit(tx.clone());
        worker.submit(Box::new(queued)).unwrap();

        let mut rejected = SleepTask::new(3, 0);
        rejected.set_response_conduit(tx.clone());
        let err = worker.submit(Box::new(rejected)).unwrap_err();
        assert!(matches!(err, Error::QueueFull));

        // switching to the waiting submit path blocks until the queue drains
        worker.set_wait_for_availability(true);
        let mut retried = SleepTask::new(4, 0);
        retried.set_response_conduit(tx);
        worker.submit(Box::new(retried)).unwrap();

        // all accepted tasks complete in order
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap().task_id, 1);
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap().task_id, 2);
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap().task_id, 4);
        worker.stop();
    }

    #[test]
    fn test_panicking_task_reports_failure() {
        let mut worker = Worker::new(&test_cfg(2, false), "w-test".into()).into_started();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut task = SleepTask::new(9, 0);
        task.panic = true;
        task.set_response_conduit(tx);
        worker.submit(Box::new(task)).unwrap();

        let response = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(response.task_id, 9);
        assert_eq!(response.status, TaskStatus::CompletedFailed);
        assert!(response.errors[0].contains("intentional test panic"));
        worker.stop();
    }

    #[test]
    fn test_conduitless_task_is_dropped_not_wedged() {
        let mut worker = Worker::new(&test_cfg(2, false), "w-test".into()).into_started();
        worker.submit(Box::new(SleepTask::new(1, 0))).unwrap();

        // the loop must survive the dropped task and execute the next one
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut task = SleepTask::new(2, 0);
        task.set_response_conduit(tx);
        worker.submit(Box::new(task)).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap().task_id, 2);
        worker.stop();
    }

    #[test]
    fn test_stop_then_submit_fails() {
        let mut worker = Worker::new(&test_cfg(2, false), "w-test".into()).into_started();
        worker.stop();
        let err = worker.submit(Box::new(SleepTask::new(1, 0))).unwrap_err();
        assert!(matches!(err, Error::NotStarted));
        // second stop is a no-op
        worker.stop();
    }

    impl Worker {
        fn into_started(mut self) -> Self {
            self.start().unwrap();
            self
        }
    }
}

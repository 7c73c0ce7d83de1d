//! Submission orchestration.
//!
//! For every task the dispatcher reserves a response conduit, registers a
//! waiter, and only then hands the task to the worker pool, so the result
//! cannot arrive before anyone is listening for it. A per-task housekeeper
//! thread tears the bookkeeping down once the result lands; a blocking
//! submitter additionally waits for the result inline.

use crate::config::{DispatcherSettings, ExecPoolSettings, ExecutorSettings};
use crate::dispatch::conduits::ResponseConduits;
use crate::dispatch::stats::TaskStats;
use crate::dispatch::waiters::{WaiterEntry, WaiterRegistry};
use crate::error::{Error, Result};
use crate::executor::pool::WorkerPool;
use crate::executor::task::{Response, Task};
use crate::sync::RetryBroadcast;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Pause between two retries of a waiter signal.
const SIGNAL_GAP: Duration = Duration::from_micros(40);
/// How long a waiter signal keeps retrying before giving up.
const SIGNAL_WINDOW: Duration = Duration::from_millis(10);
/// Waiters re-check their completion flag at this interval in case a
/// notification raced past them entirely.
const SIGNAL_POLL: Duration = Duration::from_millis(50);

/// Coordinates the worker pool, the response conduits and the waiter
/// registry for one service instance.
#[derive(Debug)]
pub struct Dispatcher {
    pool: WorkerPool,
    conduits: Arc<ResponseConduits>,
    waiters: Arc<WaiterRegistry>,
    stats: Arc<TaskStats>,
}

impl Dispatcher {
    /// Build the dispatcher and its collaborators from the config sections.
    pub fn new(
        dispatcher_cfg: &DispatcherSettings,
        pool_cfg: &ExecPoolSettings,
        worker_cfg: &ExecutorSettings,
    ) -> Self {
        let waiters = Arc::new(WaiterRegistry::new());
        let conduits = Arc::new(ResponseConduits::new(dispatcher_cfg, Arc::clone(&waiters)));
        Dispatcher {
            pool: WorkerPool::new(pool_cfg, worker_cfg),
            conduits,
            waiters,
            stats: Arc::new(TaskStats::new()),
        }
    }

    /// Start the worker pool, then the conduit readers.
    pub fn start(&mut self) -> Result<()> {
        self.pool.start()?;
        self.conduits.start()
    }

    /// Stop the worker pool, then the conduit readers.
    pub fn stop(&mut self) {
        self.pool.stop();
        self.conduits.stop();
    }

    /// Submit one task.
    ///
    /// A blocking task returns `Ok(Some(response))` once executed; an async
    /// task returns `Ok(None)` as soon as it is queued. Rejections leave no
    /// state behind.
    pub fn submit(&self, mut task: Box<dyn Task>) -> Result<Option<Response>> {
        let (conduit_index, conduit) = self.conduits.reserve().ok_or(Error::NoConduitAvailable)?;

        let task_id = task.id();
        let blocking = task.is_blocking();
        task.set_response_conduit(conduit);

        // The waiter must be in place before the pool sees the task; a short
        // task could otherwise complete before anyone listens for it.
        let signal = RetryBroadcast::new(SIGNAL_GAP, SIGNAL_WINDOW);
        let entry = match self.waiters.insert(task_id, blocking, signal) {
            Ok(entry) => entry,
            Err(err) => {
                self.conduits.release(conduit_index);
                return Err(err);
            }
        };
        self.spawn_housekeeper(task_id, conduit_index, Arc::clone(&entry));

        if let Err(err) = self.pool.submit(task) {
            // No result will ever arrive on the conduit. Deliver a synthetic
            // one so the housekeeper wakes and tears down normally.
            self.waiters.deliver(Response::failed_to_submit(task_id));
            if let Err(signal_err) = entry.signal.signal() {
                tracing::warn!(task_id, error = %signal_err, "could not wake housekeeper");
            }
            return Err(err);
        }
        self.stats.task_submitted(blocking);
        tracing::debug!(task_id, blocking, "task submitted");

        if blocking {
            while !entry.received() {
                entry.signal.wait_for(SIGNAL_POLL);
            }
            let response = entry.take_response();
            if response.is_none() {
                tracing::warn!(task_id, "blocking task completed without a stored result");
            }
            return Ok(response);
        }
        Ok(None)
    }

    /// The counters kept for this dispatcher.
    pub fn stats(&self) -> &Arc<TaskStats> {
        &self.stats
    }

    /// The waiter registry (one entry per in-flight task).
    pub fn waiters(&self) -> &Arc<WaiterRegistry> {
        &self.waiters
    }

    /// Total tasks queued in the worker pool.
    pub fn in_queue(&self) -> usize {
        self.pool.in_queue()
    }

    /// Number of workers across both pool lanes.
    pub fn total_workers(&self) -> usize {
        self.pool.total_workers()
    }

    // One housekeeper per submitted task: waits for the result to land, then
    // unwinds the registry entry, the conduit slot and the in-execution count.
    fn spawn_housekeeper(&self, task_id: i64, conduit_index: usize, entry: Arc<WaiterEntry>) {
        let waiters = Arc::clone(&self.waiters);
        let conduits = Arc::clone(&self.conduits);
        let stats = Arc::clone(&self.stats);
        let spawned = thread::Builder::new()
            .name(String::from("taskmill-housekeeper"))
            .spawn(move || {
                while !entry.received() {
                    entry.signal.wait_for(SIGNAL_POLL);
                }
                waiters.remove(task_id);
                conduits.release(conduit_index);
                stats.task_done();
                tracing::debug!(task_id, "waiter torn down");
            });
        if let Err(err) = spawned {
            tracing::error!(task_id, error = %err, "failed to spawn housekeeper");
        }
    }
}

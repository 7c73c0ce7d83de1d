//! Dual worker pool, split between blocking and async submitters.

use crate::config::{ExecPoolSettings, ExecutorSettings};
use crate::error::{Error, Result};
use crate::executor::task::Task;
use crate::executor::worker::Worker;

/// Two parallel arrays of identically configured workers. Blocking tasks are
/// kept off the async lane so a fire-and-forget burst cannot starve callers
/// that wait inline for their result.
#[derive(Debug)]
pub struct WorkerPool {
    async_workers: Vec<Worker>,
    blocking_workers: Vec<Worker>,
}

impl WorkerPool {
    /// Build the pool. Workers stay idle until [`WorkerPool::start`].
    pub fn new(pool_cfg: &ExecPoolSettings, worker_cfg: &ExecutorSettings) -> Self {
        let async_workers = (0..pool_cfg.async_task_executor_count)
            .map(|i| Worker::new(worker_cfg, format!("taskmill-async-{}", i)))
            .collect();
        let blocking_workers = (0..pool_cfg.blocking_task_executor_count)
            .map(|i| Worker::new(worker_cfg, format!("taskmill-blocking-{}", i)))
            .collect();
        WorkerPool {
            async_workers,
            blocking_workers,
        }
    }

    /// Start every worker in both lanes.
    pub fn start(&mut self) -> Result<()> {
        for worker in self
            .async_workers
            .iter_mut()
            .chain(self.blocking_workers.iter_mut())
        {
            worker.start()?;
        }
        tracing::info!(
            async_workers = self.async_workers.len(),
            blocking_workers = self.blocking_workers.len(),
            "worker pool started"
        );
        Ok(())
    }

    /// Route a task to the least-loaded worker of the matching lane.
    /// Ties go to the lowest index.
    pub fn submit(&self, task: Box<dyn Task>) -> Result<()> {
        let lane = if task.is_blocking() {
            &self.blocking_workers
        } else {
            &self.async_workers
        };
        match lane.iter().min_by_key(|worker| worker.in_queue()) {
            Some(worker) => worker.submit(task),
            None => Err(Error::worker("pool has no workers for this task kind")),
        }
    }

    /// Total tasks queued across both lanes.
    pub fn in_queue(&self) -> usize {
        self.async_workers
            .iter()
            .chain(self.blocking_workers.iter())
            .map(Worker::in_queue)
            .sum()
    }

    /// Number of workers across both lanes.
    pub fn total_workers(&self) -> usize {
        self.async_workers.len() + self.blocking_workers.len()
    }

    /// Stop every worker in both lanes.
    pub fn stop(&mut self) {
        for worker in self
            .async_workers
            .iter_mut()
            .chain(self.blocking_workers.iter_mut())
        {
            worker.stop();
        }
    }
}

//! Registry of in-flight tasks awaiting results.
//!
//! One entry per submitted task, keyed by task id. Entries are shared
//! (`Arc`) between the registry, the submitting caller, the per-task
//! housekeeper and the conduit readers, so a completed entry stays readable
//! by its waiters even after the registry drops it.

use crate::error::{Error, Result};
use crate::executor::task::Response;
use crate::sync::RetryBroadcast;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
struct DeliveryState {
    received: bool,
    response: Option<Response>,
}

/// Completion state for one in-flight task.
#[derive(Debug)]
pub struct WaiterEntry {
    blocking: bool,
    /// Signal fired once the result is stored
    pub signal: RetryBroadcast,
    state: Mutex<DeliveryState>,
}

impl WaiterEntry {
    /// Whether the submitter of this task waits inline.
    pub fn blocking(&self) -> bool {
        self.blocking
    }

    /// Whether the result has been stored.
    pub fn received(&self) -> bool {
        self.state.lock().received
    }

    /// Take the stored result, leaving the received flag set.
    pub fn take_response(&self) -> Option<Response> {
        self.state.lock().response.take()
    }

    fn deliver(&self, response: Response) {
        let mut state = self.state.lock();
        state.response = Some(response);
        state.received = true;
    }
}

/// Synchronized map from task id to waiter entry.
#[derive(Debug, Default)]
pub struct WaiterRegistry {
    entries: Mutex<HashMap<i64, Arc<WaiterEntry>>>,
}

impl WaiterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        WaiterRegistry::default()
    }

    /// Register a waiter for `task_id`. At most one waiter may exist per task
    /// id at any instant; a second registration is rejected.
    pub fn insert(
        &self,
        task_id: i64,
        blocking: bool,
        signal: RetryBroadcast,
    ) -> Result<Arc<WaiterEntry>> {
        match self.entries.lock().entry(task_id) {
            Entry::Occupied(_) => Err(Error::invalid_task(format!(
                "task id {} already has a waiter",
                task_id
            ))),
            Entry::Vacant(slot) => {
                let entry = Arc::new(WaiterEntry {
                    blocking,
                    signal,
                    state: Mutex::new(DeliveryState {
                        received: false,
                        response: None,
                    }),
                });
                slot.insert(Arc::clone(&entry));
                Ok(entry)
            }
        }
    }

    /// Store a delivered result on the matching entry and return it so the
    /// caller can fire its signal. `None` when no waiter is registered for
    /// the response's task id.
    pub fn deliver(&self, response: Response) -> Option<Arc<WaiterEntry>> {
        let entry = self.entries.lock().get(&response.task_id).cloned()?;
        entry.deliver(response);
        Some(entry)
    }

    /// Drop the entry for `task_id`. Shared handles stay readable.
    pub fn remove(&self, task_id: i64) -> Option<Arc<WaiterEntry>> {
        self.entries.lock().remove(&task_id)
    }

    /// Number of in-flight entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no task is in flight.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

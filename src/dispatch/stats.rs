//! Live submission counters.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Point-in-time view of the counters, serializable to the wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// When the service started counting
    pub up_since_when: DateTime<Utc>,
    /// Tasks accepted by submit since start
    pub total_tasks_submitted: u64,
    /// Accepted tasks whose submitter waited inline
    pub blocking_tasks_submitted: u64,
    /// Accepted fire-and-forget tasks
    pub async_tasks_submitted: u64,
    /// Accepted tasks whose result has not been torn down yet
    pub tasks_in_execution: i64,
}

/// Task statistics for one dispatcher, mutated under a mutex.
#[derive(Debug)]
pub struct TaskStats {
    inner: Mutex<StatsSnapshot>,
}

impl TaskStats {
    /// Fresh counters, up since now.
    pub fn new() -> Self {
        TaskStats {
            inner: Mutex::new(StatsSnapshot {
                up_since_when: Utc::now(),
                total_tasks_submitted: 0,
                blocking_tasks_submitted: 0,
                async_tasks_submitted: 0,
                tasks_in_execution: 0,
            }),
        }
    }

    /// Count one accepted submission.
    pub fn task_submitted(&self, blocking: bool) {
        let mut stats = self.inner.lock();
        if blocking {
            stats.blocking_tasks_submitted += 1;
        } else {
            stats.async_tasks_submitted += 1;
        }
        stats.total_tasks_submitted += 1;
        stats.tasks_in_execution += 1;
    }

    /// Count one torn-down task.
    pub fn task_done(&self) {
        self.inner.lock().tasks_in_execution -= 1;
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner.lock().clone()
    }

    /// Current counters as a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.snapshot())
            .map_err(|e| Error::service(format!("could not serialize counters: {}", e)))
    }
}

impl Default for TaskStats {
    fn default() -> Self {
        TaskStats::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = TaskStats::new();
        stats.task_submitted(true);
        stats.task_submitted(false);
        stats.task_submitted(false);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_tasks_submitted, 3);
        assert_eq!(snapshot.blocking_tasks_submitted, 1);
        assert_eq!(snapshot.async_tasks_submitted, 2);
        assert_eq!(snapshot.tasks_in_execution, 3);

        stats.task_done();
        stats.task_done();
        stats.task_done();
        assert_eq!(stats.snapshot().tasks_in_execution, 0);
    }

    #[test]
    fn test_wire_field_names() {
        let stats = TaskStats::new();
        stats.task_submitted(false);

        let value: serde_json::Value = serde_json::from_str(&stats.to_json().unwrap()).unwrap();
        assert!(value.get("up_since_when").is_some());
        assert_eq!(value["total_tasks_submitted"], 1);
        assert_eq!(value["blocking_tasks_submitted"], 0);
        assert_eq!(value["async_tasks_submitted"], 1);
        assert_eq!(value["tasks_in_execution"], 1);
    }

    #[test]
    fn test_snapshot_round_trips() {
        let stats = TaskStats::new();
        stats.task_submitted(true);
        let parsed: StatsSnapshot = serde_json::from_str(&stats.to_json().unwrap()).unwrap();
        assert_eq!(parsed, stats.snapshot());
    }
}

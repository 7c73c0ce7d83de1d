//! End-to-end scenarios against the service facade.

mod common;

use common::{wait_until, SleepTask};
use std::time::{Duration, Instant};
use taskmill::dispatch::StatsSnapshot;
use taskmill::prelude::*;

#[test]
fn test_default_config_two_tasks() {
    let mut service = ExecutionService::from_config(ServiceConfig::default()).unwrap();
    service.start().unwrap();

    let blocking = SleepTask::new(30, true);
    let blocking_id = blocking.task_id();
    let response = service
        .submit(Box::new(blocking))
        .unwrap()
        .expect("blocking submit returns a response");
    assert_eq!(response.task_id, blocking_id);
    assert_eq!(response.status, TaskStatus::CompletedOk);

    let response = service.submit(Box::new(SleepTask::new(1_000, false))).unwrap();
    assert!(response.is_none(), "async submit returns immediately");

    // the monitor must observe a quiescent service within a few ticks
    let samples = service.monitor().samples();
    let deadline = Instant::now() + Duration::from_secs(3);
    let mut quiescent = None;
    while Instant::now() < deadline {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let sample = match samples.recv_timeout(remaining) {
            Ok(sample) => sample,
            Err(_) => break,
        };
        let snapshot: StatsSnapshot = serde_json::from_str(&sample).unwrap();
        if snapshot.tasks_in_execution == 0 && snapshot.total_tasks_submitted == 2 {
            quiescent = Some(snapshot);
            break;
        }
    }
    let snapshot = quiescent.expect("monitor reported quiescence within 3s");
    assert_eq!(snapshot.blocking_tasks_submitted, 1);
    assert_eq!(snapshot.async_tasks_submitted, 1);

    service.stop();
}

#[test]
fn test_blocking_latency_covers_task_sleep() {
    let mut service = ExecutionService::from_config(ServiceConfig::default()).unwrap();
    service.start().unwrap();

    let task_duration = Duration::from_micros(100);
    let start = Instant::now();
    let response = service
        .submit(Box::new(SleepTask::new(100, true)))
        .unwrap()
        .expect("blocking submit returns a response");
    let elapsed = start.elapsed();

    assert_eq!(response.status, TaskStatus::CompletedOk);
    assert!(
        elapsed >= task_duration,
        "submit returned after {:?}, before the task's {:?} sleep",
        elapsed,
        task_duration
    );

    service.stop();
}

#[test]
fn test_conduit_backpressure_without_wait() {
    let mut config = ServiceConfig::default();
    config.dispatcher.channel_count = 1;
    config.dispatcher.channel_capacity = 2;
    config.dispatcher.wait_for_chan_avail = false;
    config.exec_pool.async_task_executor_count = 1;
    config.exec_pool.blocking_task_executor_count = 1;
    config.executor.task_queue_capacity = 1;

    let mut service = ExecutionService::from_config(config).unwrap();
    service.start().unwrap();

    // two long-running tasks take both conduit slots...
    assert!(service.submit(Box::new(SleepTask::new(50_000, false))).is_ok());
    assert!(service.submit(Box::new(SleepTask::new(50_000, false))).is_ok());
    // ...so the third is turned away
    let err = service
        .submit(Box::new(SleepTask::new(10, false)))
        .unwrap_err();
    assert!(matches!(err, Error::NoConduitAvailable));

    // the accepted tasks drain normally
    assert!(wait_until(Duration::from_secs(2), || {
        let snapshot: StatsSnapshot =
            serde_json::from_str(&service.snapshot().unwrap()).unwrap();
        snapshot.tasks_in_execution == 0 && snapshot.total_tasks_submitted == 2
    }));

    service.stop();
}

#[test]
fn test_worker_backpressure_without_wait() {
    let mut config = ServiceConfig::default();
    config.exec_pool.async_task_executor_count = 1;
    config.exec_pool.blocking_task_executor_count = 1;
    config.executor.task_queue_capacity = 1;
    config.executor.wait_for_availability = false;

    let mut service = ExecutionService::from_config(config).unwrap();
    service.start().unwrap();

    // first task occupies the worker, second fills its one-slot queue
    service.submit(Box::new(SleepTask::new(50_000, false))).unwrap();
    std::thread::sleep(Duration::from_millis(5));
    service.submit(Box::new(SleepTask::new(50_000, false))).unwrap();

    let err = service
        .submit(Box::new(SleepTask::new(10, false)))
        .unwrap_err();
    assert!(matches!(err, Error::QueueFull));

    service.stop();
}

#[test]
fn test_quiescence_counters_add_up() {
    let mut service = ExecutionService::from_config(ServiceConfig::default()).unwrap();
    service.start().unwrap();

    for i in 0..8u64 {
        let blocking = i % 2 == 0;
        let response = service
            .submit(Box::new(SleepTask::new(20 + i * 10, blocking)))
            .unwrap();
        assert_eq!(response.is_some(), blocking);
    }

    assert!(wait_until(Duration::from_secs(3), || {
        let snapshot: StatsSnapshot =
            serde_json::from_str(&service.snapshot().unwrap()).unwrap();
        snapshot.tasks_in_execution == 0
    }));
    let snapshot: StatsSnapshot = serde_json::from_str(&service.snapshot().unwrap()).unwrap();
    assert_eq!(snapshot.total_tasks_submitted, 8);
    assert_eq!(snapshot.blocking_tasks_submitted, 4);
    assert_eq!(snapshot.async_tasks_submitted, 4);

    service.stop();
}

#[test]
fn test_service_from_embedded_default_file() {
    // an unreadable file with use_default set falls back to the embedded config
    let mut service = ExecutionService::from_config_file("no-such-file.json", true).unwrap();
    service.start().unwrap();

    let response = service
        .submit(Box::new(SleepTask::new(30, true)))
        .unwrap()
        .expect("blocking submit returns a response");
    assert_eq!(response.status, TaskStatus::CompletedOk);

    service.stop();
    // stopping again is a clean no-op
    service.stop();
}

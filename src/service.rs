//! Client-facing execution service.
//!
//! Thin facade over the dispatcher: loads configuration, bootstraps logging
//! when nothing else has, wires up the monitor and exposes submit, snapshot
//! and lifecycle calls to the rest of the process.

use crate::config::{self, LogSettings, ServiceConfig};
use crate::dispatch::{Dispatcher, TaskStats};
use crate::error::Result;
use crate::executor::task::{Response, Task};
use crate::logging::{self, LoggingGuard};
use crate::monitor::{Monitor, Monitored};
use std::sync::Arc;

// Lightweight view handed to the monitor so it does not have to hold the
// service itself.
struct StatsProbe {
    stats: Arc<TaskStats>,
}

impl Monitored for StatsProbe {
    fn name(&self) -> &str {
        "ExecutionService"
    }

    fn data(&self) -> String {
        self.stats.to_json().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "could not serialize counters");
            String::from("{}")
        })
    }
}

/// The task execution service.
///
/// Construct one from a config file or record, call [`ExecutionService::start`],
/// and submit boxed [`Task`] implementations.
#[derive(Debug)]
pub struct ExecutionService {
    dispatcher: Dispatcher,
    monitor: Monitor,
    config: ServiceConfig,
    _log_guard: Option<LoggingGuard>,
}

impl ExecutionService {
    /// Build a service from the named configuration file.
    ///
    /// The file is resolved per [`config::load`]; with `use_default` set an
    /// unreadable file falls back to the embedded default configuration.
    pub fn from_config_file(file_name: &str, use_default: bool) -> Result<Self> {
        let (service_cfg, log_cfg) = config::load(file_name, use_default)?;
        Self::build(service_cfg, &log_cfg)
    }

    /// Build a service from an in-memory configuration record.
    pub fn from_config(service_cfg: ServiceConfig) -> Result<Self> {
        Self::build(service_cfg, &LogSettings::default())
    }

    fn build(service_cfg: ServiceConfig, log_cfg: &LogSettings) -> Result<Self> {
        service_cfg.validate()?;
        let log_guard = logging::init(log_cfg);

        let dispatcher = Dispatcher::new(
            &service_cfg.dispatcher,
            &service_cfg.exec_pool,
            &service_cfg.executor,
        );
        let probe = StatsProbe {
            stats: Arc::clone(dispatcher.stats()),
        };
        let monitor = Monitor::new(
            service_cfg.monitoring.monitoring_frequency,
            service_cfg.monitoring.channel_buffer_size,
            Arc::new(probe),
        );
        tracing::info!(config = ?service_cfg, "execution service built");

        Ok(ExecutionService {
            dispatcher,
            monitor,
            config: service_cfg,
            _log_guard: log_guard,
        })
    }

    /// Start the dispatcher and the monitor.
    pub fn start(&mut self) -> Result<()> {
        self.dispatcher.start()?;
        self.monitor.start();
        Ok(())
    }

    /// Stop accepting work and wind the service down. In-flight tasks finish.
    pub fn stop(&mut self) {
        self.dispatcher.stop();
        self.monitor.stop();
    }

    /// Submit one task; see [`Dispatcher::submit`] for the contract.
    pub fn submit(&self, task: Box<dyn Task>) -> Result<Option<Response>> {
        self.dispatcher.submit(task)
    }

    /// Current counters, serialized to their JSON wire form.
    pub fn snapshot(&self) -> Result<String> {
        self.dispatcher.stats().to_json()
    }

    /// Copy of the configuration in use.
    pub fn clone_config(&self) -> ServiceConfig {
        self.config.clone()
    }

    /// The monitor attached to this service.
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }
}

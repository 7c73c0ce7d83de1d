//! Service configuration and JSON loading.
//!
//! Configuration lives in a JSON file with two top-level elements:
//! `ExecServiceSettings` (everything the service needs) and an optional
//! `LogSettings` sibling consumed by the logging bootstrap. A file given with
//! an absolute path is read as-is; a bare name is looked up in the directory
//! named by the `TASKMILL_CFG_HOME` environment variable; callers may also
//! opt into the embedded default when neither resolves.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the JSON element holding the service configuration.
pub const EXEC_SERVICE_CFG_ELEMENT: &str = "ExecServiceSettings";

/// Name of the JSON element holding the logging configuration.
pub const LOG_CFG_ELEMENT: &str = "LogSettings";

/// Environment variable naming the directory searched for config files.
pub const CFG_HOME_ENV: &str = "TASKMILL_CFG_HOME";

static DEFAULT_CFG: &str = include_str!("../static/default-cfg.json");

/// Response conduit settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherSettings {
    /// Number of conduits used to receive task results
    pub channel_count: usize,
    /// Buffer capacity of each conduit; also the cap on tasks per conduit
    pub channel_capacity: usize,
    /// Whether submission blocks until a conduit slot frees up
    pub wait_for_chan_avail: bool,
}

/// Worker pool sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecPoolSettings {
    /// Workers handling fire-and-forget tasks
    pub async_task_executor_count: usize,
    /// Workers handling tasks whose submitter waits for the result
    pub blocking_task_executor_count: usize,
}

/// Per-worker settings, identical for every worker in the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorSettings {
    /// Tasks a worker queues while already executing one
    pub task_queue_capacity: usize,
    /// Whether submission blocks on a full intake queue
    pub wait_for_availability: bool,
}

/// Monitoring cadence and buffering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringSettings {
    /// Seconds between two snapshot polls
    #[serde(rename = "MonitoringFrequency")]
    pub monitoring_frequency: u64,
    /// Capacity of the published-snapshot channel
    #[serde(rename = "ChannelBufferSize")]
    pub channel_buffer_size: usize,
}

/// Complete configuration for one execution service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Response conduit settings
    #[serde(rename = "DispatcherSettings")]
    pub dispatcher: DispatcherSettings,
    /// Worker pool sizing
    #[serde(rename = "ExecPoolSettings")]
    pub exec_pool: ExecPoolSettings,
    /// Per-worker settings
    #[serde(rename = "ExecutorSettings")]
    pub executor: ExecutorSettings,
    /// Monitoring cadence
    #[serde(rename = "MonitoringSettings")]
    pub monitoring: MonitoringSettings,
}

/// Logging bootstrap settings, from the `LogSettings` JSON element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Log file path; no file output when absent
    #[serde(rename = "LogFileName")]
    pub log_file_name: Option<String>,
    /// Mirror log output to stdout
    #[serde(rename = "LogOnConsole")]
    pub log_on_console: bool,
    /// Default the filter to debug level instead of info
    #[serde(rename = "DebugLog")]
    pub debug_log: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            log_file_name: None,
            log_on_console: true,
            debug_log: false,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        // kept in step with static/default-cfg.json
        ServiceConfig {
            dispatcher: DispatcherSettings {
                channel_count: 4,
                channel_capacity: 4,
                wait_for_chan_avail: true,
            },
            exec_pool: ExecPoolSettings {
                async_task_executor_count: 2,
                blocking_task_executor_count: 2,
            },
            executor: ExecutorSettings {
                task_queue_capacity: 8,
                wait_for_availability: true,
            },
            monitoring: MonitoringSettings {
                monitoring_frequency: 1,
                channel_buffer_size: 10,
            },
        }
    }
}

impl ServiceConfig {
    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.dispatcher.channel_count == 0 {
            return Err(Error::config("channel_count must be > 0"));
        }
        if self.dispatcher.channel_capacity == 0 {
            return Err(Error::config("channel_capacity must be > 0"));
        }
        if self.exec_pool.async_task_executor_count == 0 {
            return Err(Error::config("async_task_executor_count must be > 0"));
        }
        if self.exec_pool.blocking_task_executor_count == 0 {
            return Err(Error::config("blocking_task_executor_count must be > 0"));
        }
        let workers =
            self.exec_pool.async_task_executor_count + self.exec_pool.blocking_task_executor_count;
        if workers > 1024 {
            return Err(Error::config("executor counts too large (max 1024 total)"));
        }
        if self.executor.task_queue_capacity == 0 {
            return Err(Error::config("task_queue_capacity must be > 0"));
        }
        if self.monitoring.monitoring_frequency == 0 {
            return Err(Error::config("MonitoringFrequency must be > 0"));
        }
        Ok(())
    }
}

/// Load configuration from `file_name`, falling back to the embedded default
/// when the file cannot be read and `use_default` is set.
pub fn load(file_name: &str, use_default: bool) -> Result<(ServiceConfig, LogSettings)> {
    let raw = match read_config_text(file_name) {
        Ok(text) => text,
        Err(err) if use_default => {
            tracing::warn!(
                file_name,
                error = %err,
                "config file unavailable, using the embedded default"
            );
            DEFAULT_CFG.to_string()
        }
        Err(err) => return Err(err),
    };
    parse(&raw)
}

/// Parse a full configuration document from a JSON string.
pub fn parse(raw: &str) -> Result<(ServiceConfig, LogSettings)> {
    let root: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| Error::config(format!("invalid configuration JSON: {}", e)))?;

    let element = root
        .get(EXEC_SERVICE_CFG_ELEMENT)
        .ok_or_else(|| Error::config(format!("missing {} element", EXEC_SERVICE_CFG_ELEMENT)))?;
    let config: ServiceConfig = serde_json::from_value(element.clone())
        .map_err(|e| Error::config(format!("invalid {}: {}", EXEC_SERVICE_CFG_ELEMENT, e)))?;
    config.validate()?;

    let log_settings = match root.get(LOG_CFG_ELEMENT) {
        Some(element) => serde_json::from_value(element.clone())
            .map_err(|e| Error::config(format!("invalid {}: {}", LOG_CFG_ELEMENT, e)))?,
        None => LogSettings::default(),
    };

    Ok((config, log_settings))
}

fn read_config_text(file_name: &str) -> Result<String> {
    let path = resolve_path(file_name)?;
    Ok(fs::read_to_string(path)?)
}

fn resolve_path(file_name: &str) -> Result<PathBuf> {
    let given = Path::new(file_name);
    if given.is_absolute() {
        return Ok(given.to_path_buf());
    }
    match env::var(CFG_HOME_ENV) {
        Ok(dir) if !dir.is_empty() => Ok(Path::new(&dir).join(file_name)),
        _ => Err(Error::config(format!(
            "{} is not set and {} is not an absolute path",
            CFG_HOME_ENV, file_name
        ))),
    }
}

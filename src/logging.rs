//! Tracing bootstrap for the service.
//!
//! Output goes to stdout and/or a non-blocking file appender, driven by the
//! `LogSettings` element of the configuration. The filter honors `RUST_LOG`
//! when set. Installation is best-effort: if the host process already set up
//! a subscriber, that one stays in place and this bootstrap backs off.

use crate::config::LogSettings;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the file writer alive; dropping it flushes and closes the log file.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

impl std::fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingGuard").finish_non_exhaustive()
    }
}

/// Install a tracing subscriber per the given settings.
///
/// Returns the guard for the file appender when one was set up, and `None`
/// when a subscriber was already installed or no file output is configured.
pub fn init(settings: &LogSettings) -> Option<LoggingGuard> {
    let mut guard = None;

    let file_layer = settings.log_file_name.as_ref().and_then(|file_path| {
        let path = Path::new(file_path);
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if let Err(err) = std::fs::create_dir_all(dir) {
            eprintln!("taskmill: cannot create log directory {:?}: {}", dir, err);
            return None;
        }
        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("taskmill.log"));

        let appender = tracing_appender::rolling::never(dir, file);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        guard = Some(LoggingGuard {
            _file_guard: file_guard,
        });
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
    });

    let stdout_layer = settings
        .log_on_console
        .then(|| tracing_subscriber::fmt::layer().with_writer(io::stdout));

    let default_level = if settings.debug_log { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .is_err()
    {
        // a subscriber is already installed; keep it
        return None;
    }
    guard
}

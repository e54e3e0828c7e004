//! # Observability
//!
//! Centralized logging setup for Shutter services.
//!
//! Services call `observability::init()` once at startup and use standard
//! `tracing` macros everywhere else. They do not know where logs go.
//!
//! ## Outputs
//!
//! - Without a log path, events are written to stderr in the compact
//!   `tracing-subscriber` format.
//! - With a log path, events are appended as JSONL (one object per line) so
//!   the file can be followed with `tail -f shutter.jsonl | jq`. Stderr output
//!   can be kept alongside for foreground runs.
//!
//! `RUST_LOG` always overrides the configured default level.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "shutter".into(),
//!         default_level: "debug".into(),
//!         also_stderr: true,
//!         ..Default::default()
//!     });
//!
//!     tracing::info!("service started");
//! }
//! ```

mod file;
mod json_layer;

use std::path::PathBuf;

pub use file::{default_log_path, AppendLogWriter};
pub use json_layer::{JsonLayer, LogEntry};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "shutter").
    /// Included in every JSONL line for filtering.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional JSONL log file. When unset, logs only go to stderr.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr when a log file is configured.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: true,
        }
    }
}

/// Initialize logging with default settings.
///
/// ```rust,ignore
/// fn main() {
///     observability::init("shutter");
///     tracing::info!("ready");
/// }
/// ```
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with custom configuration.
///
/// If the configured log file cannot be opened, falls back to stderr and
/// reports the failure as the first log line.
pub fn init_with_config(config: LogConfig) {
    if let Some(path) = config.log_path.clone() {
        match file::init_file_subscriber(&config, &path) {
            Ok(()) => return,
            Err(e) => {
                init_stderr(&config);
                tracing::warn!(
                    log_path = %path.display(),
                    error = %e,
                    "failed to open log file, logging to stderr only"
                );
                return;
            }
        }
    }

    init_stderr(&config);
}

fn init_stderr(config: &LogConfig) {
    use tracing_subscriber::util::SubscriberInitExt;

    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(&config.default_level))
        .with_target(true)
        .compact()
        .with_writer(std::io::stderr)
        .finish()
        .try_init();
}

/// Build the level filter from `RUST_LOG`, falling back to `default_level`.
pub(crate) fn env_filter(default_level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level))
}

/// Re-export tracing macros for convenience.
/// Services can use `observability::info!()` or `tracing::info!()`.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.service_name, "unknown");
        assert_eq!(config.default_level, "info");
        assert!(config.log_path.is_none());
        assert!(config.also_stderr);
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init("observability-test");
        init("observability-test");
        tracing::info!("still alive");
    }
}

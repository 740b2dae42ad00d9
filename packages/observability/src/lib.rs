//! # Observability
//!
//! Structured logging for the Leaguer crates.
//!
//! Library crates only emit `tracing` events. Binaries call
//! [`init_with_config`] once at startup, which installs:
//!
//! - a JSONL layer appending one object per event to the configured file
//!   (`~/.leaguer/logs/leaguer.jsonl` by default),
//! - an optional compact stderr layer for interactive use.
//!
//! Fields whose names look like credentials (`token`, `password`, `secret`,
//! `authorization`) are written as `[redacted]`.
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "cli".into(),
//!         default_level: "debug".into(),
//!         also_stderr: true,
//!         ..Default::default()
//!     });
//!     tracing::info!("ready");
//! }
//! ```

mod json_layer;
mod sink;

use std::path::PathBuf;

pub use json_layer::{JsonLayer, LogEntry};
pub use sink::JsonlFileWriter;

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "cli", "listener").
    /// Included in every log line for filtering.
    pub service_name: String,
    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,
    /// Optional custom log file path.
    /// Defaults to `~/.leaguer/logs/leaguer.jsonl`.
    pub log_path: Option<PathBuf>,
    /// Also emit logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging with default settings for the given service.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with custom configuration.
///
/// Calling this more than once is harmless: later calls leave the first
/// subscriber in place.
pub fn init_with_config(config: LogConfig) {
    sink::init_subscriber(&config);
}

pub use tracing::{debug, error, info, instrument, trace, warn};
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
        assert!(!config.also_stderr);
    }
}

//! Logging initialization.
//!
//! Every binary writes structured JSONL to `~/.leaguer/logs/leaguer.jsonl`
//! through the `observability` package. Set `LEAGUER_LOG_STDERR=1` to mirror
//! events to stderr.

use crate::Paths;
use observability::LogConfig;

/// Initialize logging for one binary.
///
/// ```ignore
/// init_logging_for_service("cli", "info");
/// tracing::info!("client started");
/// ```
pub fn init_logging_for_service(service_name: &str, level: &str) {
    let log_path = Paths::new().ok().map(|paths| paths.log_file());
    let also_stderr = std::env::var("LEAGUER_LOG_STDERR")
        .map(|raw| matches!(raw.trim(), "1" | "true" | "yes"))
        .unwrap_or(false);

    observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        log_path,
        also_stderr,
    });
}

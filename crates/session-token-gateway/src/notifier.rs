//! User-facing notification sink.

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Receives messages the user should see (toasts in a UI, stderr in a CLI).
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, message: &str);
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => info!(notification = %message, "User notification"),
            Severity::Warning => warn!(notification = %message, "User notification"),
            Severity::Error => error!(notification = %message, "User notification"),
        }
    }
}

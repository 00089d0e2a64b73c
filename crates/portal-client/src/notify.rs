//! User-facing notifications for terminal failures.

use log::{error, info, warn};

/// How loudly a notification should be surfaced.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Severity {
    Info,
    Warning,
    Error,
    /// The session is gone and the user must act (log in again).
    Fatal,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

/// Surfaces failures to a human (a UI toast, a terminal, ...).
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Sink that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Info => info!("[Notify] {}", notification.message),
            Severity::Warning => warn!("[Notify] {}", notification.message),
            Severity::Error | Severity::Fatal => error!("[Notify] {}", notification.message),
        }
    }
}

//! Operator notifications

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyLevel::Info => write!(f, "INFO"),
            NotifyLevel::Warning => write!(f, "WARNING"),
            NotifyLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Sink for scheduler notifications (mail, chat, ...)
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NotifyLevel, message: &str);
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: NotifyLevel, message: &str) {
        match level {
            NotifyLevel::Info => tracing::info!(target: "invguard::notify", "{}", message),
            NotifyLevel::Warning => tracing::warn!(target: "invguard::notify", "{}", message),
            NotifyLevel::Error => tracing::error!(target: "invguard::notify", "{}", message),
        }
    }
}

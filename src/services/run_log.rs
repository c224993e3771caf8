//! Accumulating operator log for one sync run.
//!
//! Messages are collected for the status view and mirrored to `tracing`.
//! An error entry does not abort anything by itself; hard failures are
//! decided by the caller.

use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogMessage {
    pub level: LogLevel,
    pub message: String,
}

/// Thread-safe message accumulator scoped to one run.
#[derive(Debug, Default)]
pub struct RunLog {
    messages: Mutex<Vec<LogMessage>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{message}");
        self.messages.lock().push(LogMessage {
            level: LogLevel::Info,
            message,
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{message}");
        self.messages.lock().push(LogMessage {
            level: LogLevel::Error,
            message,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.messages
            .lock()
            .iter()
            .any(|m| m.level == LogLevel::Error)
    }

    pub fn messages(&self) -> Vec<LogMessage> {
        self.messages.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_in_order() {
        let log = RunLog::new();
        log.info("first");
        log.error("second");
        log.info("third");

        let messages = log.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].message, "first");
        assert_eq!(messages[1].level, LogLevel::Error);
        assert!(log.has_errors());
    }

    #[test]
    fn no_errors_by_default() {
        let log = RunLog::new();
        log.info("fine");
        assert!(!log.has_errors());
    }
}

//! Pipeline log broadcasting.
//!
//! Every pipeline run reports its stages through a process-wide broadcast
//! channel. Entries are echoed to stderr (stdout is reserved for CLI output)
//! and streamed to HTTP clients via Server-Sent Events.
//!
//! Uploads run inside [`with_job`], so every entry they emit carries the
//! upload's job id and SSE clients can pick out their own lines.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::broadcast;

tokio::task_local! {
    static JOB_ID: String;
}

/// Run `fut` with `job_id` attached to every entry it logs.
pub async fn with_job<F: Future>(job_id: String, fut: F) -> F::Output {
    JOB_ID.scope(job_id, fut).await
}

/// Job id of the enclosing [`with_job`] scope, if any.
pub fn current_job() -> Option<String> {
    JOB_ID.try_with(|id| id.clone()).ok()
}

/// Capacity of the broadcast buffer; slow SSE clients skip older entries.
const LOG_CHANNEL_CAPACITY: usize = 100;

/// Log level for client display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting depth for sub-steps
    #[serde(default)]
    pub indent: u8,
    /// Upload that produced the entry; `None` for CLI runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl LogEntry {
    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            indent: 0,
            job_id: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }

    fn render(&self) -> String {
        let prefix = match self.level {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
        };
        let indent = "   ".repeat(self.indent as usize);
        match &self.job_id {
            Some(job) => format!(
                "[{}] {}{} {}",
                job.chars().take(8).collect::<String>(),
                indent,
                prefix,
                self.message
            ),
            None => format!("{}{} {}", indent, prefix, self.message),
        }
    }
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Broadcasts log entries to all connected SSE clients
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Echo to stderr and send to all subscribers
    pub fn log(&self, mut entry: LogEntry) {
        if entry.job_id.is_none() {
            entry.job_id = current_job();
        }
        eprintln!("{}", entry.render());

        // No receivers is the normal CLI case
        let _ = self.sender.send(entry);
    }

    /// Get a receiver for SSE streaming
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::error(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::info(msg).with_indent(indent));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_receives_entries() {
        let broadcaster = LogBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster.log(LogEntry::success("Built retention matrix"));

        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.level, LogLevel::Success);
        assert_eq!(entry.message, "Built retention matrix");
    }

    #[test]
    fn test_log_without_subscribers_is_fine() {
        let broadcaster = LogBroadcaster::new();
        broadcaster.log(LogEntry::info("nobody listening"));
    }

    #[test]
    fn test_entry_serialization() {
        let entry = LogEntry::warning("2 cohorts have a zero baseline").with_indent(1);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["level"], "warning");
        assert_eq!(json["indent"], 1);
    }

    #[tokio::test]
    async fn test_entries_carry_job_id() {
        let broadcaster = LogBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        with_job("3f2a9c1e-upload".to_string(), async {
            broadcaster.log(LogEntry::info("Reading upload"));
        })
        .await;
        broadcaster.log(LogEntry::info("CLI run"));

        let scoped = rx.try_recv().unwrap();
        assert_eq!(scoped.job_id.as_deref(), Some("3f2a9c1e-upload"));
        assert!(scoped.render().starts_with("[3f2a9c1e]"));

        let unscoped = rx.try_recv().unwrap();
        assert_eq!(unscoped.job_id, None);
        assert!(serde_json::to_value(&unscoped).unwrap().get("jobId").is_none());
    }

    #[test]
    fn test_current_job_outside_scope() {
        assert_eq!(current_job(), None);
    }

    #[test]
    fn test_render_indents() {
        let entry = LogEntry::info("Month 1").with_indent(2);
        assert!(entry.render().starts_with("      "));
        assert!(entry.render().ends_with("Month 1"));
    }
}

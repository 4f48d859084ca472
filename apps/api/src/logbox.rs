//! Activity log — the user-visible, timestamped event stream.
//!
//! Every pipeline emits agent-attributed events through a `LogSink` closure;
//! the session wires those into a `LogBuffer` (bounded ring) that the API
//! exposes. Operational logging still goes through `tracing` — this buffer
//! is the product-facing trail, not the ops one.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category of an activity-log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Success,
    Warning,
    Error,
    Agent,
}

/// One user-visible log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub kind: LogKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
}

/// Callback signature pipelines use to report progress.
/// Arguments: kind, message, attributed agent name.
pub type LogSink<'a> = dyn Fn(LogKind, &str, Option<&str>) + Send + Sync + 'a;

const DEFAULT_CAPACITY: usize = 500;

/// Bounded in-memory ring of activity-log entries.
pub struct LogBuffer {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl LogBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity,
        }
    }

    /// Appends an entry, evicting the oldest when full. Also mirrors the
    /// event into `tracing` so the ops log stays complete.
    pub fn push(&self, kind: LogKind, message: &str, agent_name: Option<&str>) {
        match kind {
            LogKind::Warning => tracing::warn!(agent = agent_name, "{message}"),
            LogKind::Error => tracing::error!(agent = agent_name, "{message}"),
            _ => tracing::info!(agent = agent_name, "{message}"),
        }

        let entry = LogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            message: message.to_string(),
            kind,
            agent_name: agent_name.map(str::to_string),
        };

        let mut entries = self.entries.lock().expect("log buffer poisoned");
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Snapshot of all buffered entries, oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .expect("log buffer poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

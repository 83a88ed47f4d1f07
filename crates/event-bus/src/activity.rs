//! Operator-facing activity log.
//!
//! Every run start/stop, task outcome and persistence failure is appended here as one
//! timestamped line. Lines are kept in a bounded ring for later inspection and fanned out on
//! a broadcast channel for live printing.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug, Serialize)]
pub struct LogLine {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let local = self.at.with_timezone(&Local);
        let marker = match self.level {
            LogLevel::Info => "",
            LogLevel::Warn => "WARN ",
            LogLevel::Error => "ERROR ",
        };
        write!(f, "[{}] {}{}", local.format("%H:%M:%S"), marker, self.message)
    }
}

struct BoundedRing<T> {
    capacity: usize,
    data: VecDeque<T>,
}

impl<T: Clone> BoundedRing<T> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            data: VecDeque::new(),
        }
    }

    fn push(&mut self, item: T) {
        if self.data.len() == self.capacity {
            self.data.pop_front();
        }
        self.data.push_back(item);
    }

    fn snapshot(&self) -> Vec<T> {
        self.data.iter().cloned().collect()
    }
}

/// Append-only activity log with a bounded history.
pub struct ActivityLog {
    lines: Mutex<BoundedRing<LogLine>>,
    sender: broadcast::Sender<LogLine>,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(16));
        Arc::new(Self {
            lines: Mutex::new(BoundedRing::new(capacity)),
            sender,
        })
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(LogLevel::Info, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(LogLevel::Error, message.into());
    }

    pub fn push(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => info!(target: "activity", "{message}"),
            LogLevel::Warn => warn!(target: "activity", "{message}"),
            LogLevel::Error => error!(target: "activity", "{message}"),
        }
        let line = LogLine {
            at: Utc::now(),
            level,
            message,
        };
        self.lines.lock().push(line.clone());
        // No live subscriber is fine; the ring keeps the line.
        let _ = self.sender.send(line);
    }

    pub fn snapshot(&self) -> Vec<LogLine> {
        self.lines.lock().snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogLine> {
        self.sender.subscribe()
    }
}

// Activity Log
// In-memory system log for the dashboard, capped at the most recent entries

use std::collections::VecDeque;
use tracing::{error, info};

use crate::models::{LogKind, SystemLogEntry};

pub const MAX_LOG_ENTRIES: usize = 50;

#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: VecDeque<SystemLogEntry>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, dropping the oldest once the cap is reached. Mirrored to tracing.
    pub fn record(&mut self, message: impl Into<String>, kind: LogKind) {
        let message = message.into();
        match kind {
            LogKind::Error => error!(kind = ?kind, "{}", message),
            _ => info!(kind = ?kind, "{}", message),
        }

        if self.entries.len() == MAX_LOG_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(SystemLogEntry {
            id: uuid::Uuid::new_v4().simple().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            message,
            kind,
        });
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &SystemLogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

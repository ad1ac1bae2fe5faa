//! Bounded in-memory activity log for operator surfaces.
//!
//! Most-recent-first, capped. Every trade, leg failure, rebalance and
//! refresh decision lands here in addition to `tracing`; nothing the core
//! swallows goes unrecorded, and nothing here blocks operation.

use std::collections::VecDeque;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::models::VenueId;

/// Entries kept before the oldest falls off.
pub const ACTIVITY_LOG_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub ts_ms: i64,
    pub level: ActivityLevel,
    /// Venue the entry is about, when it is about one leg specifically.
    pub venue: Option<VenueId>,
    pub message: String,
}

pub struct ActivityLog {
    entries: Mutex<VecDeque<ActivityEntry>>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(ACTIVITY_LOG_CAPACITY)
    }
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, level: ActivityLevel, venue: Option<VenueId>, message: impl Into<String>) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_back();
        }
        entries.push_front(ActivityEntry {
            ts_ms: Utc::now().timestamp_millis(),
            level,
            venue,
            message: message.into(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(ActivityLevel::Info, None, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.push(ActivityLevel::Warn, None, message);
    }

    pub fn error_for(&self, venue: VenueId, message: impl Into<String>) {
        self.push(ActivityLevel::Error, Some(venue), message);
    }

    /// Most recent first.
    pub fn snapshot(&self) -> Vec<ActivityEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

//! Conversation Memory
//!
//! Stores the most recent message turns per user for conversation continuity.
//! Each user owns a fixed-capacity ring buffer; when it is full the oldest
//! entry is overwritten. Nothing survives a restart.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::UserId;

/// Default number of entries kept per user
pub const DEFAULT_CAPACITY: usize = 10;

pub const CONTEXT_START: &str = "[Previous conversation:]";
pub const CONTEXT_END: &str = "[End of conversation]";

/// Who wrote an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Bot => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Fixed-capacity ring buffer: slots are allocated once, `head` points at the oldest entry.
#[derive(Debug)]
struct EntryLog {
    slots: Vec<Option<MemoryEntry>>,
    head: usize,
    len: usize,
}

impl EntryLog {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn push(&mut self, entry: MemoryEntry) {
        let cap = self.capacity();
        if cap == 0 {
            return;
        }
        if self.len < cap {
            let tail = (self.head + self.len) % cap;
            self.slots[tail] = Some(entry);
            self.len += 1;
        } else {
            // full: overwrite the oldest and advance
            self.slots[self.head] = Some(entry);
            self.head = (self.head + 1) % cap;
        }
    }

    /// The last `n` entries, oldest first
    fn last(&self, n: usize) -> Vec<MemoryEntry> {
        let take = n.min(self.len);
        let skip = self.len - take;
        let cap = self.capacity();
        (skip..self.len)
            .filter_map(|i| self.slots[(self.head + i) % cap].clone())
            .collect()
    }

    fn clear(&mut self) -> usize {
        let removed = self.len;
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.len = 0;
        removed
    }
}

/// Per-user bounded conversation memory
pub struct ConversationMemory {
    capacity: usize,
    logs: DashMap<UserId, EntryLog>,
}

impl ConversationMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            logs: DashMap::new(),
        }
    }

    /// Append an entry, evicting the oldest one when the log is full
    pub fn add_message(&self, user: UserId, role: Role, text: &str) {
        let entry = MemoryEntry {
            role,
            text: text.to_string(),
            timestamp: Utc::now(),
        };
        self.logs
            .entry(user)
            .or_insert_with(|| EntryLog::with_capacity(self.capacity))
            .push(entry);
        debug!("Added {} message for user {}", role, user);
    }

    /// Most recent `last_n` entries in chronological order
    pub fn get_history(&self, user: UserId, last_n: usize) -> Vec<MemoryEntry> {
        self.logs
            .get(&user)
            .map(|log| log.last(last_n))
            .unwrap_or_default()
    }

    /// History rendered as a transcript block for prompt injection.
    ///
    /// Empty when the user has no history; callers omit it from the prompt.
    pub fn get_context_string(&self, user: UserId, last_n: usize) -> String {
        let history = self.get_history(user, last_n);
        if history.is_empty() {
            return String::new();
        }

        let mut context = String::from(CONTEXT_START);
        context.push('\n');
        for entry in &history {
            context.push_str(&format!("{}: {}\n", entry.role.label(), entry.text));
        }
        context.push_str(CONTEXT_END);
        context
    }

    /// Empty a user's log. Returns whether anything was removed.
    pub fn clear_history(&self, user: UserId) -> bool {
        let removed = self
            .logs
            .get_mut(&user)
            .map(|mut log| log.clear())
            .unwrap_or(0);
        if removed > 0 {
            info!("Cleared {} messages for user {}", removed, user);
        }
        removed > 0
    }

    pub fn get_stats(&self) -> MemoryStats {
        let (users, entries) = self
            .logs
            .iter()
            .fold((0, 0), |(users, entries), log| (users + 1, entries + log.len));
        MemoryStats { users, entries }
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Global memory statistics
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MemoryStats {
    pub users: usize,
    pub entries: usize,
}

//! Submitted-line history for querysh
//!
//! Every line the user submits gets a stable, 1-based index. Indices are
//! handed out by a counter that never goes backwards, so trimming the oldest
//! entries or clearing the log never causes an index to be reused.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::error::{Result, TerminalError};

/// A single history entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    index: u64,
    line: String,
}

impl HistoryEntry {
    /// Create an entry, rejecting indices below 1.
    pub fn new(index: i64, line: impl Into<String>) -> Result<Self> {
        if index < 1 {
            return Err(TerminalError::InvalidArgument(format!(
                "index < 1. index={}",
                index
            )));
        }
        Ok(Self {
            index: index as u64,
            line: line.into(),
        })
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn line(&self) -> &str {
        &self.line
    }
}

struct HistoryState {
    /// Entries in submission order (oldest first)
    entries: VecDeque<HistoryEntry>,
    /// Index given to the next appended line
    next_index: u64,
}

/// Append-only log of submitted lines
pub struct HistoryLog {
    state: Mutex<HistoryState>,
    /// Maximum retained entries (0 = unlimited)
    max_entries: usize,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryLog {
    /// Create a log that keeps every line
    pub fn new() -> Self {
        Self::with_limit(0)
    }

    /// Create a log that keeps at most `max_entries` lines (0 = unlimited)
    pub fn with_limit(max_entries: usize) -> Self {
        Self {
            state: Mutex::new(HistoryState {
                entries: VecDeque::new(),
                next_index: 1,
            }),
            max_entries,
        }
    }

    /// Record a submitted line and return its entry
    pub fn append(&self, line: impl Into<String>) -> HistoryEntry {
        let mut state = self.state.lock();
        let entry = HistoryEntry {
            index: state.next_index,
            line: line.into(),
        };
        state.next_index += 1;
        state.entries.push_back(entry.clone());

        if self.max_entries > 0 {
            while state.entries.len() > self.max_entries {
                state.entries.pop_front();
            }
        }

        entry
    }

    /// Copy of every entry appended before this call, oldest first
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.state.lock().entries.iter().cloned().collect()
    }

    /// Look up an entry by its index
    pub fn get(&self, index: u64) -> Option<HistoryEntry> {
        let state = self.state.lock();
        // Retained entries have contiguous indices
        let first = state.entries.front()?.index;
        let offset = index.checked_sub(first)?;
        state.entries.get(offset as usize).cloned()
    }

    /// Drop all entries. The index counter keeps counting.
    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}

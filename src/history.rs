//! In-memory search history for the interactive browser.
//!
//! Bounded to `defaults.history_size` entries; the oldest entry is dropped
//! when full. Repeating the most recent search does not add an entry.
//! Nothing is persisted.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use tc_search_core::models::Scope;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub query: String,
    pub scope: Scope,
    pub result_count: u64,
    pub searched_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(query: impl Into<String>, scope: Scope, result_count: u64) -> Self {
        Self {
            query: query.into(),
            scope,
            result_count,
            searched_at: Utc::now(),
        }
    }
}

/// Bounded, navigable list of past searches.
#[derive(Debug, Clone)]
pub struct SearchHistory {
    entries: VecDeque<HistoryEntry>,
    max_size: usize,
    /// Index of the entry last returned by navigation; starts at the newest.
    cursor: Option<usize>,
}

impl SearchHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_size.min(1024)),
            max_size: max_size.max(1),
            cursor: None,
        }
    }

    /// Record a search. Returns false if it repeated the newest entry.
    pub fn add(&mut self, entry: HistoryEntry) -> bool {
        let duplicate = self
            .entries
            .back()
            .map(|last| last.query == entry.query && last.scope == entry.scope)
            .unwrap_or(false);
        if !duplicate {
            if self.entries.len() == self.max_size {
                self.entries.pop_front();
            }
            self.entries.push_back(entry);
        }
        self.cursor = self.entries.len().checked_sub(1);
        !duplicate
    }

    /// Step back to an older entry.
    pub fn previous(&mut self) -> Option<&HistoryEntry> {
        let cursor = self.cursor?;
        if cursor == 0 {
            return None;
        }
        self.cursor = Some(cursor - 1);
        self.entries.get(cursor - 1)
    }

    /// Step forward to a newer entry.
    pub fn next(&mut self) -> Option<&HistoryEntry> {
        let cursor = self.cursor?;
        if cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor = Some(cursor + 1);
        self.entries.get(cursor + 1)
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }
}

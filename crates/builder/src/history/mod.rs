// Undo/redo history: a depth-bounded, append-only snapshot log with a
// cursor.
//
// The timeline is strictly linear: pushing a new entry after an undo
// discards everything past the cursor. There is no redo tree — a known
// limitation, not a bug.

use chrono::{DateTime, Utc};
use tabula_common::action::BuilderAction;
use tabula_common::types::Dashboard;

/// Default depth bound for the snapshot log.
pub const DEFAULT_MAX_HISTORY_STEPS: usize = 50;

/// An immutable snapshot of the dashboard at a point in time.
///
/// Owns an independent deep copy; live edits can never corrupt it.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub dashboard: Dashboard,
    pub action: BuilderAction,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// Linear snapshot log with a 0-based, inclusive cursor.
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
    cursor: usize,
    max_steps: usize,
}

impl HistoryLog {
    /// Seed the log with the initial document state as entry 0.
    pub fn new(
        initial: Dashboard,
        action: BuilderAction,
        description: impl Into<String>,
        max_steps: usize,
    ) -> Self {
        let entry = HistoryEntry {
            dashboard: initial,
            action,
            description: description.into(),
            timestamp: Utc::now(),
        };
        Self { entries: vec![entry], cursor: 0, max_steps: max_steps.max(1) }
    }

    /// Append a snapshot after the cursor, discarding any redo branch.
    /// When the log exceeds `max_steps`, the oldest entries are dropped
    /// and the cursor re-based.
    pub fn push(
        &mut self,
        dashboard: Dashboard,
        action: BuilderAction,
        description: impl Into<String>,
    ) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(HistoryEntry {
            dashboard,
            action,
            description: description.into(),
            timestamp: Utc::now(),
        });
        self.cursor = self.entries.len() - 1;

        if self.entries.len() > self.max_steps {
            let overflow = self.entries.len() - self.max_steps;
            self.entries.drain(..overflow);
            self.cursor -= overflow;
        }
    }

    /// Step the cursor back one entry. Returns `None` (nothing changed)
    /// at the start of the timeline.
    pub fn undo(&mut self) -> Option<&HistoryEntry> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(&self.entries[self.cursor])
    }

    /// Step the cursor forward one entry. Returns `None` at the tail.
    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(&self.entries[self.cursor])
    }

    /// Collapse the log to a single entry: the current cursor's snapshot.
    pub fn clear(&mut self) {
        let current = self.entries[self.cursor].clone();
        self.entries = vec![current];
        self.cursor = 0;
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The entry the cursor currently points at.
    pub fn current(&self) -> &HistoryEntry {
        &self.entries[self.cursor]
    }
}

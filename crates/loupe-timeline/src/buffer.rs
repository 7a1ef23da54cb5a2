//! Capacity-bounded, deduplicating buffer for the live log view.

use std::collections::HashSet;

use loupe_core::LogEntry;

/// Default number of entries the live view keeps in memory.
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// Deduplicating merge buffer backing the live display.
///
/// Holds at most `capacity` entries, ordered descending by timestamp, with
/// at most one entry per ID. Ingest is O(n log n); correctness (no duplicate
/// IDs ever visible) matters more than asymptotics at this scale.
#[derive(Debug, Clone)]
pub struct MergeBuffer {
    entries: Vec<LogEntry>,
    capacity: usize,
}

impl MergeBuffer {
    /// Creates a buffer holding at most `capacity` entries.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Merges new entries into the buffer.
    ///
    /// Concatenates, deduplicates by ID, sorts descending by timestamp, and
    /// truncates to capacity. Entries are immutable by ID, so which copy of
    /// a duplicate survives is unspecified.
    pub fn ingest(&mut self, new_entries: Vec<LogEntry>) {
        if new_entries.is_empty() {
            return;
        }

        let mut seen: HashSet<String> = HashSet::with_capacity(self.entries.len());
        let mut merged: Vec<LogEntry> = Vec::with_capacity(self.entries.len() + new_entries.len());

        for entry in self.entries.drain(..).chain(new_entries) {
            if seen.insert(entry.id.clone()) {
                merged.push(entry);
            }
        }

        // Stable sort keeps relative order of equal timestamps
        merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        merged.truncate(self.capacity);

        self.entries = merged;
    }

    /// Current entries, newest first.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Current entries in ascending timestamp order, for interleaving.
    #[must_use]
    pub fn entries_ascending(&self) -> Vec<LogEntry> {
        self.entries.iter().rev().cloned().collect()
    }

    /// Number of buffered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the buffer holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Removes everything from the buffer.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for MergeBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

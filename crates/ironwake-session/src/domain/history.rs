//! Append-only command history.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ironwake_core::history::{AggregateKind, AggregateRef, CommandHistoryEntry};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Size and time span of the retained history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Retained entries.
    pub entry_count: usize,
    /// Sum of the entries' serialized sizes.
    pub approximate_bytes: usize,
    /// Timestamp of the oldest retained entry.
    pub oldest: Option<DateTime<Utc>>,
    /// Timestamp of the newest retained entry.
    pub newest: Option<DateTime<Utc>>,
    /// Seconds between oldest and newest.
    pub span_seconds: i64,
    /// Entries per aggregate kind.
    pub by_kind: BTreeMap<AggregateKind, usize>,
    /// Entries not yet handed to persistence.
    pub pending: usize,
}

/// What remains after a prune.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruneBaseline {
    /// Store version the history was cut at.
    pub version: u64,
    /// Full store state at that version.
    pub state: serde_json::Value,
    /// When the prune happened.
    pub pruned_at: DateTime<Utc>,
    /// Entries discarded.
    pub removed: usize,
}

/// Log of committed batches with a flush cursor.
#[derive(Debug, Clone, Default)]
pub struct CommandHistory {
    entries: Vec<CommandHistoryEntry>,
    flushed: usize,
    baseline: Option<PruneBaseline>,
}

impl CommandHistory {
    /// An empty history with no baseline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a committed batch.
    pub fn append(&mut self, entry: CommandHistoryEntry) {
        self.entries.push(entry);
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All retained entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[CommandHistoryEntry] {
        &self.entries
    }

    /// Retained entries filed under `aggregate`, oldest first.
    #[must_use]
    pub fn for_aggregate(&self, aggregate: AggregateRef) -> Vec<&CommandHistoryEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.aggregate == aggregate)
            .collect()
    }

    /// The snapshot kept by the last prune.
    #[must_use]
    pub fn baseline(&self) -> Option<&PruneBaseline> {
        self.baseline.as_ref()
    }

    /// Counts and bounds of the retained entries.
    #[must_use]
    pub fn stats(&self) -> HistoryStats {
        let oldest = self.entries.first().map(|entry| entry.recorded_at);
        let newest = self.entries.last().map(|entry| entry.recorded_at);
        let span_seconds = match (oldest, newest) {
            (Some(oldest), Some(newest)) => (newest - oldest).num_seconds(),
            _ => 0,
        };
        let mut by_kind = BTreeMap::new();
        for entry in &self.entries {
            *by_kind.entry(entry.aggregate.kind).or_insert(0) += 1;
        }
        HistoryStats {
            entry_count: self.entries.len(),
            approximate_bytes: self
                .entries
                .iter()
                .map(CommandHistoryEntry::approximate_size)
                .sum(),
            oldest,
            newest,
            span_seconds,
            by_kind,
            pending: self.entries.len() - self.flushed,
        }
    }

    /// Discard every entry, keeping `state` as the new baseline.
    ///
    /// Entries not yet flushed are discarded too.
    pub fn prune(
        &mut self,
        version: u64,
        state: serde_json::Value,
        now: DateTime<Utc>,
    ) -> &PruneBaseline {
        let removed = self.entries.len();
        self.entries.clear();
        self.flushed = 0;
        self.baseline.insert(PruneBaseline {
            version,
            state,
            pruned_at: now,
            removed,
        })
    }

    /// Entries recorded since the last flush.
    #[must_use]
    pub fn pending_tail(&self) -> &[CommandHistoryEntry] {
        &self.entries[self.flushed..]
    }

    /// Move the flush cursor past `last_entry_id`.
    ///
    /// Does nothing if the entry is no longer retained.
    pub fn mark_flushed(&mut self, last_entry_id: Uuid) {
        if let Some(position) = self
            .entries
            .iter()
            .position(|entry| entry.entry_id == last_entry_id)
        {
            self.flushed = self.flushed.max(position + 1);
        }
    }
}

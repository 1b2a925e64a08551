//! Command-history entry types.
//!
//! One [`CommandHistoryEntry`] is recorded per committed mutation batch and is
//! never modified afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of aggregate a history entry is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    /// A player character (round state, traits, equipment).
    Character,
    /// A crew (momentum, membership).
    Crew,
    /// A clock.
    Clock,
}

impl std::fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Character => write!(f, "character"),
            Self::Crew => write!(f, "crew"),
            Self::Clock => write!(f, "clock"),
        }
    }
}

/// Reference to a single aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AggregateRef {
    /// Aggregate kind.
    pub kind: AggregateKind,
    /// Aggregate identifier.
    pub id: Uuid,
}

impl AggregateRef {
    /// Reference to a character.
    #[must_use]
    pub fn character(id: Uuid) -> Self {
        Self {
            kind: AggregateKind::Character,
            id,
        }
    }

    /// Reference to a crew.
    #[must_use]
    pub fn crew(id: Uuid) -> Self {
        Self {
            kind: AggregateKind::Crew,
            id,
        }
    }

    /// Reference to a clock.
    #[must_use]
    pub fn clock(id: Uuid) -> Self {
        Self {
            kind: AggregateKind::Clock,
            id,
        }
    }
}

/// Audit record for one committed batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandHistoryEntry {
    /// Unique entry identifier.
    pub entry_id: Uuid,
    /// Aggregate the entry is filed under.
    pub aggregate: AggregateRef,
    /// Type name of the request or command that produced the batch.
    pub command_type: String,
    /// Type names of each operation in the batch, in order.
    pub operation_types: Vec<String>,
    /// Request id of the peer request that produced the batch, if any.
    pub request_id: Option<String>,
    /// Correlation ID for tracing a request through its effects.
    pub correlation_id: Uuid,
    /// Serialized operations.
    pub payload: serde_json::Value,
    /// Store version after the batch committed.
    pub store_version: u64,
    /// Timestamp of the commit.
    pub recorded_at: DateTime<Utc>,
}

impl CommandHistoryEntry {
    /// Approximate serialized size of the entry in bytes.
    #[must_use]
    pub fn approximate_size(&self) -> usize {
        serde_json::to_vec(self).map_or(0, |bytes| bytes.len())
    }
}

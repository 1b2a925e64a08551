//! Persistence port.
//!
//! The storage medium, schedule and format are owned by the collaborator
//! implementing [`SnapshotRepository`]; the engine only hands over a
//! serializable snapshot of the full store plus the pending history tail.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::history::CommandHistoryEntry;

/// Stored representation of a store snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSnapshot {
    /// Unique snapshot identifier.
    pub snapshot_id: Uuid,
    /// Store version the snapshot was taken at.
    pub version: i64,
    /// Serialized store state.
    pub state: serde_json::Value,
    /// History entries recorded since the previous flush.
    pub history_tail: Vec<CommandHistoryEntry>,
    /// Timestamp of the snapshot.
    pub taken_at: DateTime<Utc>,
}

/// Repository trait for saving and loading store snapshots.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Load the most recent snapshot, if any has been saved.
    async fn load_latest(&self) -> Result<Option<StoredSnapshot>, DomainError>;

    /// Save a snapshot and append its history tail.
    ///
    /// Implementations reject a snapshot whose version is older than the
    /// latest stored one with `DomainError::ConcurrencyConflict`.
    async fn save(&self, snapshot: &StoredSnapshot) -> Result<(), DomainError>;
}

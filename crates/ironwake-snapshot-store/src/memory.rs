//! In-memory implementation of the `SnapshotRepository` trait.

use async_trait::async_trait;
use tokio::sync::RwLock;

use ironwake_core::error::DomainError;
use ironwake_core::repository::{SnapshotRepository, StoredSnapshot};

/// Keeps every saved snapshot in process memory.
#[derive(Debug, Default)]
pub struct InMemorySnapshotRepository {
    snapshots: RwLock<Vec<StoredSnapshot>>,
}

impl InMemorySnapshotRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots saved so far.
    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    /// Whether nothing has been saved.
    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotRepository for InMemorySnapshotRepository {
    async fn load_latest(&self) -> Result<Option<StoredSnapshot>, DomainError> {
        Ok(self.snapshots.read().await.last().cloned())
    }

    async fn save(&self, snapshot: &StoredSnapshot) -> Result<(), DomainError> {
        let mut snapshots = self.snapshots.write().await;
        if let Some(latest) = snapshots
            .last()
            .filter(|latest| snapshot.version < latest.version)
        {
            return Err(DomainError::ConcurrencyConflict {
                expected: latest.version,
                actual: snapshot.version,
            });
        }
        snapshots.push(snapshot.clone());
        Ok(())
    }
}

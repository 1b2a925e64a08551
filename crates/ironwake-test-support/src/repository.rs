//! Test repositories — mock `SnapshotRepository` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use ironwake_core::error::DomainError;
use ironwake_core::repository::{SnapshotRepository, StoredSnapshot};

/// A snapshot repository that records every `save` call and returns the
/// configured snapshot from `load_latest` until something is saved.
#[derive(Debug, Default)]
pub struct RecordingSnapshotRepository {
    initial: Option<StoredSnapshot>,
    saved: Mutex<Vec<StoredSnapshot>>,
}

impl RecordingSnapshotRepository {
    /// Create a repository whose `load_latest` returns `initial` until a
    /// snapshot is saved.
    #[must_use]
    pub fn new(initial: Option<StoredSnapshot>) -> Self {
        Self {
            initial,
            saved: Mutex::new(Vec::new()),
        }
    }

    /// Returns every snapshot that was saved, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn saved_snapshots(&self) -> Vec<StoredSnapshot> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotRepository for RecordingSnapshotRepository {
    async fn load_latest(&self) -> Result<Option<StoredSnapshot>, DomainError> {
        let saved = self.saved.lock().unwrap();
        Ok(saved.last().cloned().or_else(|| self.initial.clone()))
    }

    async fn save(&self, snapshot: &StoredSnapshot) -> Result<(), DomainError> {
        self.saved.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

/// A snapshot repository that always returns an infrastructure error. Useful
/// for testing error-handling paths.
#[derive(Debug)]
pub struct FailingSnapshotRepository;

#[async_trait]
impl SnapshotRepository for FailingSnapshotRepository {
    async fn load_latest(&self) -> Result<Option<StoredSnapshot>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn save(&self, _snapshot: &StoredSnapshot) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

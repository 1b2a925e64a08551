//! Hand-off to the persistence collaborator.

use ironwake_core::error::DomainError;
use ironwake_core::repository::SnapshotRepository;
use serde::Serialize;
use tracing::{info, instrument};

use super::actor::AuthorityHandle;
use super::authority::decode_store;
use crate::domain::store::GameStore;

/// Outcome of a flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Store version persisted.
    pub version: i64,
    /// History entries included in the snapshot.
    pub history_entries: usize,
}

/// Persist the current store and the pending history tail.
///
/// The flush cursor only advances once the repository accepted the snapshot.
///
/// # Errors
///
/// Returns the repository's error, or `DomainError::AuthorityUnreachable` if
/// the authority task has stopped.
#[instrument(skip_all)]
pub async fn flush(
    handle: &AuthorityHandle,
    repository: &dyn SnapshotRepository,
) -> Result<FlushReport, DomainError> {
    let pending = handle.prepare_flush().await?;
    repository.save(&pending.snapshot).await?;
    if let Some(through) = pending.through {
        handle.mark_flushed(through).await?;
    }
    let report = FlushReport {
        version: pending.snapshot.version,
        history_entries: pending.snapshot.history_tail.len(),
    };
    info!(
        version = report.version,
        history_entries = report.history_entries,
        "store flushed"
    );
    Ok(report)
}

/// Load the most recent store, if one was ever flushed.
///
/// # Errors
///
/// Returns the repository's error, or `DomainError::Infrastructure` if the
/// stored state does not decode.
pub async fn restore(repository: &dyn SnapshotRepository) -> Result<Option<GameStore>, DomainError> {
    match repository.load_latest().await? {
        Some(snapshot) => {
            let store = decode_store(&snapshot)?;
            info!(version = store.version, "store restored");
            Ok(Some(store))
        }
        None => Ok(None),
    }
}

//! Authority task and its handle.
//!
//! The authority runs on one tokio task and processes jobs from an mpsc queue
//! in arrival order; callers get results back over oneshot channels.

use ironwake_core::error::DomainError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::authority::{Authority, CommitReceipt, PendingFlush};
use crate::domain::envelopes::{BroadcastEnvelope, RefreshSignal, RequestEnvelope, ResponseEnvelope};
use crate::domain::history::{HistoryStats, PruneBaseline};
use crate::domain::operations::Operation;
use crate::domain::store::GameStore;

type Job = Box<dyn FnOnce(&mut Authority) + Send>;

/// Default queue depth of the authority task.
pub const DEFAULT_QUEUE_DEPTH: usize = 256;

/// Cloneable handle to a running authority task.
#[derive(Debug, Clone)]
pub struct AuthorityHandle {
    jobs: mpsc::Sender<Job>,
    broadcasts: broadcast::Sender<BroadcastEnvelope>,
    refreshes: broadcast::Sender<RefreshSignal>,
}

/// Move `authority` onto its own task.
#[must_use]
pub fn spawn_authority(authority: Authority) -> (AuthorityHandle, JoinHandle<()>) {
    spawn_authority_with_depth(authority, DEFAULT_QUEUE_DEPTH)
}

/// Like [`spawn_authority`] with an explicit queue depth.
#[must_use]
pub fn spawn_authority_with_depth(
    mut authority: Authority,
    depth: usize,
) -> (AuthorityHandle, JoinHandle<()>) {
    let (jobs, mut queue) = mpsc::channel::<Job>(depth.max(1));
    let handle = AuthorityHandle {
        jobs,
        broadcasts: authority.broadcast_sender(),
        refreshes: authority.refresh_sender(),
    };
    let task = tokio::spawn(async move {
        info!(version = authority.store().version, "authority started");
        while let Some(job) = queue.recv().await {
            job(&mut authority);
        }
        info!("authority stopped");
    });
    (handle, task)
}

impl AuthorityHandle {
    /// Run `f` on the authority task and return its result.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AuthorityUnreachable` if the task has stopped.
    pub async fn call<R, F>(&self, f: F) -> Result<R, DomainError>
    where
        R: Send + 'static,
        F: FnOnce(&mut Authority) -> R + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        self.jobs
            .send(Box::new(move |authority: &mut Authority| {
                let _ = reply.send(f(authority));
            }))
            .await
            .map_err(|_| DomainError::AuthorityUnreachable("authority task has stopped".into()))?;
        response
            .await
            .map_err(|_| DomainError::AuthorityUnreachable("authority dropped the reply".into()))
    }

    /// Submit a peer request.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AuthorityUnreachable` if the task has stopped.
    pub async fn submit(&self, request: RequestEnvelope) -> Result<ResponseEnvelope, DomainError> {
        debug!(kind = %request.kind, request_id = %request.request_id, "request queued");
        self.call(move |authority| authority.handle_request(request))
            .await
    }

    /// Commit a batch outside of the peer protocol.
    ///
    /// # Errors
    ///
    /// Returns the batch error or `DomainError::AuthorityUnreachable`.
    pub async fn execute_batch(
        &self,
        operations: Vec<Operation>,
    ) -> Result<CommitReceipt, DomainError> {
        self.call(move |authority| authority.execute_batch(operations, None))
            .await?
    }

    /// Broadcast the current state with `forceSync`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AuthorityUnreachable` if the task has stopped.
    pub async fn resync(&self) -> Result<(), DomainError> {
        self.call(Authority::resync).await
    }

    /// A copy of the current store.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AuthorityUnreachable` if the task has stopped.
    pub async fn store(&self) -> Result<GameStore, DomainError> {
        self.call(|authority| authority.store().clone()).await
    }

    /// # Errors
    ///
    /// Returns `DomainError::AuthorityUnreachable` if the task has stopped.
    pub async fn history_stats(&self) -> Result<HistoryStats, DomainError> {
        self.call(|authority| authority.history_stats()).await
    }

    /// # Errors
    ///
    /// Returns the prune error or `DomainError::AuthorityUnreachable`.
    pub async fn prune_history(&self) -> Result<PruneBaseline, DomainError> {
        self.call(Authority::prune_history).await?
    }

    /// # Errors
    ///
    /// Returns the snapshot error or `DomainError::AuthorityUnreachable`.
    pub async fn prepare_flush(&self) -> Result<PendingFlush, DomainError> {
        self.call(|authority| authority.prepare_flush()).await?
    }

    /// # Errors
    ///
    /// Returns `DomainError::AuthorityUnreachable` if the task has stopped.
    pub async fn mark_flushed(&self, through: uuid::Uuid) -> Result<(), DomainError> {
        self.call(move |authority| authority.mark_flushed(through))
            .await
    }

    /// Subscribe to broadcasts.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEnvelope> {
        self.broadcasts.subscribe()
    }

    /// Subscribe to view refresh signals.
    #[must_use]
    pub fn subscribe_refresh(&self) -> broadcast::Receiver<RefreshSignal> {
        self.refreshes.subscribe()
    }
}

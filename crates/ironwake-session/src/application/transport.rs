//! Peer-to-authority transport.

use async_trait::async_trait;
use ironwake_core::error::DomainError;
use tokio::sync::broadcast;

use super::actor::AuthorityHandle;
use crate::domain::envelopes::{BroadcastEnvelope, RequestEnvelope, ResponseEnvelope};

/// Request/response channel to the authority plus its broadcast stream.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for its response.
    async fn send(&self, request: RequestEnvelope) -> Result<ResponseEnvelope, DomainError>;

    /// Ask the authority for a forced resync broadcast.
    async fn request_resync(&self) -> Result<(), DomainError>;

    /// Subscribe to authority broadcasts.
    fn subscribe(&self) -> broadcast::Receiver<BroadcastEnvelope>;
}

/// In-process transport talking to an [`AuthorityHandle`].
#[derive(Debug, Clone)]
pub struct LocalTransport {
    handle: AuthorityHandle,
}

impl LocalTransport {
    /// A transport that talks to the in-process authority behind `handle`.
    #[must_use]
    pub fn new(handle: AuthorityHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send(&self, request: RequestEnvelope) -> Result<ResponseEnvelope, DomainError> {
        self.handle.submit(request).await
    }

    async fn request_resync(&self) -> Result<(), DomainError> {
        self.handle.resync().await
    }

    fn subscribe(&self) -> broadcast::Receiver<BroadcastEnvelope> {
        self.handle.subscribe()
    }
}

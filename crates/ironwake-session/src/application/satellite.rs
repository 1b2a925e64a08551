//! Satellite peer — a non-authoritative replica.
//!
//! A satellite never mutates shared state itself. Blocking requests wait for
//! the authority's response under a timeout; optimistic requests apply a
//! local guess and are sent in the background. Broadcasts are filtered
//! against the peer's own last-sent request id so that an echo of an older
//! request cannot overwrite a newer local guess.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ironwake_core::config::RulesConfig;
use ironwake_core::error::DomainError;
use ironwake_turn::{PlayerRoundState, TurnMachine};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::transport::Transport;
use crate::domain::envelopes::{
    BroadcastEnvelope, PlayerAction, RequestClass, RequestEnvelope, ResponseEnvelope,
};
use crate::domain::store::GameStore;

/// Default time a blocking request waits for its response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// What a satellite did with a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastDisposition {
    /// The replica now holds the broadcast state.
    Applied,
    /// A stale echo; the replica is unchanged.
    Ignored,
}

#[derive(Debug, Default)]
struct Replica {
    store: GameStore,
    last_sent: Option<String>,
    in_flight: HashSet<Uuid>,
}

impl Replica {
    fn confirm(&mut self, request_id: &str) {
        if self.last_sent.as_deref() == Some(request_id) {
            self.last_sent = None;
        }
    }
}

type Reply = oneshot::Sender<Result<ResponseEnvelope, DomainError>>;

struct Outbound {
    request: RequestEnvelope,
    reply: Option<Reply>,
}

/// A non-authoritative peer holding a replica of the store.
pub struct SatellitePeer {
    peer_id: String,
    transport: Arc<dyn Transport>,
    rules: Arc<RulesConfig>,
    timeout: Duration,
    replica: Arc<Mutex<Replica>>,
    outbound: mpsc::UnboundedSender<Outbound>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for SatellitePeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SatellitePeer")
            .field("peer_id", &self.peer_id)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SatellitePeer {
    /// A peer with an empty replica.
    ///
    /// Spawns the task that sends this peer's requests in submission order,
    /// so it must be called from within a tokio runtime.
    #[must_use]
    pub fn new(
        peer_id: impl Into<String>,
        transport: Arc<dyn Transport>,
        rules: Arc<RulesConfig>,
        timeout: Duration,
    ) -> Self {
        let replica = Arc::new(Mutex::new(Replica::default()));
        let (outbound, queue) = mpsc::unbounded_channel();
        tokio::spawn(send_in_order(
            Arc::clone(&transport),
            Arc::clone(&replica),
            timeout,
            queue,
        ));
        Self {
            peer_id: peer_id.into(),
            transport,
            rules,
            timeout,
            replica,
            outbound,
            sequence: AtomicU64::new(0),
        }
    }

    /// Prefix of every request id this peer sends.
    #[must_use]
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// A copy of the replica.
    #[must_use]
    pub fn store(&self) -> GameStore {
        lock(&self.replica).store.clone()
    }

    /// The peer's own most recently sent request id, until confirmed.
    #[must_use]
    pub fn last_sent(&self) -> Option<String> {
        lock(&self.replica).last_sent.clone()
    }

    fn next_request_id(&self) -> String {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{n}", self.peer_id)
    }

    /// Send `action` and wait for the authority's response.
    ///
    /// The replica is only changed by the broadcast that follows a commit.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an optimistic action or if a
    /// blocking request for the same character is already in flight, and
    /// `DomainError::AuthorityUnreachable` on timeout or a closed channel.
    pub async fn submit_blocking(
        &self,
        character_id: Uuid,
        action: PlayerAction,
    ) -> Result<ResponseEnvelope, DomainError> {
        if action.class() != RequestClass::Blocking {
            return Err(DomainError::Validation(format!(
                "{} must be sent as an optimistic request",
                action.kind()
            )));
        }
        let request_id = self.next_request_id();
        let request = RequestEnvelope::new(&action, character_id, request_id.clone())?;
        {
            let mut replica = lock(&self.replica);
            if !replica.in_flight.insert(character_id) {
                return Err(DomainError::Validation(format!(
                    "a blocking request is already in flight for character {character_id}"
                )));
            }
            replica.last_sent = Some(request_id.clone());
        }

        let (reply, response) = oneshot::channel();
        let result = if self
            .outbound
            .send(Outbound {
                request,
                reply: Some(reply),
            })
            .is_err()
        {
            Err(DomainError::AuthorityUnreachable(
                "outbound queue is closed".into(),
            ))
        } else {
            response.await.unwrap_or_else(|_| {
                Err(DomainError::AuthorityUnreachable(
                    "outbound task dropped the request".into(),
                ))
            })
        };

        let mut replica = lock(&self.replica);
        replica.in_flight.remove(&character_id);
        if result.is_err() {
            replica.confirm(&request_id);
        }
        drop(replica);
        result
    }

    /// Apply a local guess for `action` and queue it without waiting.
    ///
    /// A rejected request triggers a resync, which overwrites the guess.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a blocking action, the turn
    /// machine's error if the guess cannot be computed against the replica,
    /// and `DomainError::AuthorityUnreachable` if the outbound queue is closed.
    pub fn submit_optimistic(
        &self,
        character_id: Uuid,
        action: PlayerAction,
    ) -> Result<String, DomainError> {
        if action.class() != RequestClass::Optimistic {
            return Err(DomainError::Validation(format!(
                "{} must be sent as a blocking request",
                action.kind()
            )));
        }
        let request_id = self.next_request_id();
        let request = RequestEnvelope::new(&action, character_id, request_id.clone())?;
        {
            let mut replica = lock(&self.replica);
            let guess = local_guess(&replica.store, &self.rules, character_id, action)?;
            replica.store.round_states.insert(character_id, guess);
            replica.last_sent = Some(request_id.clone());
        }
        self.outbound
            .send(Outbound {
                request,
                reply: None,
            })
            .map_err(|_| DomainError::AuthorityUnreachable("outbound queue is closed".into()))?;
        Ok(request_id)
    }

    /// Apply or ignore an incoming broadcast.
    ///
    /// Forced resyncs and unconfirmed broadcasts always apply. A broadcast
    /// confirming a request applies only if it confirms this peer's last-sent
    /// request or nothing from this peer is awaiting confirmation.
    pub fn receive_broadcast(&self, envelope: BroadcastEnvelope) -> BroadcastDisposition {
        let mut replica = lock(&self.replica);
        let accept = envelope.force_sync
            || match (&envelope.last_confirmed_request_id, &replica.last_sent) {
                (None, _) | (_, None) => true,
                (Some(confirmed), Some(sent)) => confirmed == sent,
            };
        if !accept {
            debug!(
                peer_id = %self.peer_id,
                confirmed = ?envelope.last_confirmed_request_id,
                last_sent = ?replica.last_sent,
                "stale broadcast ignored"
            );
            return BroadcastDisposition::Ignored;
        }
        if let Some(confirmed) = &envelope.last_confirmed_request_id {
            replica.confirm(confirmed);
        }
        replica.store = envelope.state;
        BroadcastDisposition::Applied
    }

    /// Feed the transport's broadcasts into [`SatellitePeer::receive_broadcast`].
    ///
    /// A lagging receiver requests a resync.
    #[must_use]
    pub fn spawn_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let peer = Arc::clone(self);
        let mut broadcasts = self.transport.subscribe();
        tokio::spawn(async move {
            loop {
                match broadcasts.recv().await {
                    Ok(envelope) => {
                        peer.receive_broadcast(envelope);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(peer_id = %peer.peer_id, skipped, "broadcasts lagged; requesting resync");
                        if let Err(error) = peer.transport.request_resync().await {
                            warn!(error = %error, "resync request failed");
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

async fn send_in_order(
    transport: Arc<dyn Transport>,
    replica: Arc<Mutex<Replica>>,
    timeout: Duration,
    mut queue: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(Outbound { request, reply }) = queue.recv().await {
        let request_id = request.request_id.clone();
        let result = match tokio::time::timeout(timeout, transport.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::AuthorityUnreachable(format!(
                "no response to {request_id} within {timeout:?}"
            ))),
        };
        // An unanswered request no longer gates incoming broadcasts.
        let confirmed = result
            .as_ref()
            .map_or(request_id.as_str(), |response| {
                response.last_confirmed_request_id.as_str()
            });
        lock(&replica).confirm(confirmed);

        if let Some(reply) = reply {
            let _ = reply.send(result);
            continue;
        }
        let failure = match result {
            Ok(response) => response.error,
            Err(error) => Some(error.to_string()),
        };
        if let Some(error) = failure {
            warn!(error = %error, request_id = %request_id, "optimistic request failed; requesting resync");
            if let Err(error) = transport.request_resync().await {
                warn!(error = %error, "resync request failed");
            }
        }
    }
}

fn lock(replica: &Mutex<Replica>) -> MutexGuard<'_, Replica> {
    replica.lock().unwrap_or_else(PoisonError::into_inner)
}

fn local_guess(
    store: &GameStore,
    rules: &RulesConfig,
    character_id: Uuid,
    action: PlayerAction,
) -> Result<PlayerRoundState, DomainError> {
    let machine = TurnMachine::new(rules);
    match action {
        PlayerAction::Select(edit) => Ok(machine.select(store, character_id, edit)?.round_state),
        PlayerAction::UpdateConsequence(edit) => machine.update_draft(store, character_id, edit),
        other => Err(DomainError::Validation(format!(
            "no local guess for {}",
            other.kind()
        ))),
    }
}

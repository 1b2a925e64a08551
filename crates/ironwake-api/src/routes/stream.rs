//! WebSocket broadcast stream.
//!
//! Each connection starts with a forced-sync frame holding the full store,
//! then relays every authority broadcast. A client that falls behind the
//! broadcast channel gets another forced-sync frame instead of the skipped
//! ones.

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use ironwake_session::application::actor::AuthorityHandle;
use ironwake_session::domain::envelopes::BroadcastEnvelope;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /stream
async fn stream(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    // Subscribe before reading the store so no commit falls between them.
    let receiver = state.authority.subscribe();
    let initial = resync_frame(&state.authority).await?;
    let authority = state.authority.clone();

    Ok(ws.on_upgrade(move |socket| stream_socket(socket, authority, receiver, initial)))
}

async fn stream_socket(
    mut socket: WebSocket,
    authority: AuthorityHandle,
    mut receiver: broadcast::Receiver<BroadcastEnvelope>,
    initial: BroadcastEnvelope,
) {
    if send_envelope(&mut socket, &initial).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    _ => {}
                }
            }
            outgoing = receiver.recv() => {
                let envelope = match outgoing {
                    Ok(envelope) => envelope,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "stream client lagged, sending forced sync");
                        match resync_frame(&authority).await {
                            Ok(envelope) => envelope,
                            Err(_) => break,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if send_envelope(&mut socket, &envelope).await.is_err() {
                    break;
                }
            }
        }
    }
    debug!("stream client disconnected");
}

/// A forced-sync envelope of the current store.
async fn resync_frame(authority: &AuthorityHandle) -> Result<BroadcastEnvelope, ApiError> {
    let state = authority.store().await?;
    Ok(BroadcastEnvelope {
        state,
        last_confirmed_request_id: None,
        force_sync: true,
    })
}

async fn send_envelope(
    socket: &mut WebSocket,
    envelope: &BroadcastEnvelope,
) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(envelope).map_err(axum::Error::new)?;
    socket.send(Message::Text(payload.into())).await
}

/// Returns the router for the broadcast stream.
pub fn router() -> Router<AppState> {
    Router::new().route("/stream", get(stream))
}

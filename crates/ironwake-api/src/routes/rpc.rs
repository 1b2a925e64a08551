//! Peer request endpoint.
//!
//! Rejected actions are answered in-band: the response envelope carries
//! `success: false` with the error code, and the HTTP status stays 200. Only
//! failures to reach the authority surface as HTTP errors.

use axum::extract::State;
use axum::{Json, Router, routing::post};
use ironwake_session::domain::envelopes::{RequestEnvelope, ResponseEnvelope};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// POST /rpc
#[instrument(
    skip(state, request),
    fields(kind = %request.kind, request_id = %request.request_id, character_id = %request.character_id)
)]
async fn submit(
    State(state): State<AppState>,
    Json(request): Json<RequestEnvelope>,
) -> Result<Json<ResponseEnvelope>, ApiError> {
    let response = state.authority.submit(request).await?;

    info!(success = response.success, "handled peer request");

    Ok(Json(response))
}

/// Returns the router for peer requests.
pub fn router() -> Router<AppState> {
    Router::new().route("/rpc", post(submit))
}

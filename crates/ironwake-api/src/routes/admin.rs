//! Operator endpoints: forced resync, history maintenance and persistence.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing::get, routing::post};
use ironwake_session::application::persistence::{self, FlushReport};
use ironwake_session::domain::history::{HistoryStats, PruneBaseline};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// POST /resync
#[instrument(skip(state))]
async fn resync(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.authority.resync().await?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /history/stats
async fn history_stats(State(state): State<AppState>) -> Result<Json<HistoryStats>, ApiError> {
    Ok(Json(state.authority.history_stats().await?))
}

/// POST /history/prune
#[instrument(skip(state))]
async fn prune_history(State(state): State<AppState>) -> Result<Json<PruneBaseline>, ApiError> {
    let baseline = state.authority.prune_history().await?;
    info!(
        version = baseline.version,
        removed = baseline.removed,
        "history pruned"
    );
    Ok(Json(baseline))
}

/// POST /persistence/flush
#[instrument(skip(state))]
async fn flush(State(state): State<AppState>) -> Result<Json<FlushReport>, ApiError> {
    let report = persistence::flush(&state.authority, state.repository.as_ref()).await?;
    Ok(Json(report))
}

/// Returns the router for operator endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/resync", post(resync))
        .route("/history/stats", get(history_stats))
        .route("/history/prune", post(prune_history))
        .route("/persistence/flush", post(flush))
}

//! Route modules, one per surface of the authority.

use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod health;
pub mod queries;
pub mod rpc;
pub mod stream;

/// Every route the server exposes, state not yet attached.
pub fn router() -> Router<AppState> {
    Router::new().merge(health::router()).nest(
        "/api/v1",
        Router::new()
            .merge(rpc::router())
            .merge(queries::router())
            .merge(stream::router())
            .merge(admin::router()),
    )
}

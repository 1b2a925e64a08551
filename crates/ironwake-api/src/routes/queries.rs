//! Read-only snapshot queries.

use axum::extract::{Path, Query, State};
use axum::{Json, Router, routing::get};
use ironwake_clocks::{Clock, ClockCategory};
use ironwake_session::application::query_handlers::{self, CharacterView, CrewView};
use ironwake_turn::PlayerRoundState;
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Query string for GET /clocks.
#[derive(Debug, Deserialize)]
pub struct ClocksQuery {
    /// Owning character or crew.
    pub owner_id: Uuid,
    /// Restrict to one category.
    pub category: Option<ClockCategory>,
}

/// GET /characters/{id}
#[instrument(skip(state))]
async fn get_character(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CharacterView>, ApiError> {
    let store = state.authority.store().await?;
    let view = query_handlers::get_character_by_id(&store, id)?;
    Ok(Json(view))
}

/// GET /crews/{id}
#[instrument(skip(state))]
async fn get_crew(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CrewView>, ApiError> {
    let store = state.authority.store().await?;
    let view = query_handlers::get_crew_by_id(&store, id)?;
    Ok(Json(view))
}

/// GET /clocks?owner_id=&category=
#[instrument(skip(state))]
async fn list_clocks(
    State(state): State<AppState>,
    Query(query): Query<ClocksQuery>,
) -> Result<Json<Vec<Clock>>, ApiError> {
    let store = state.authority.store().await?;
    Ok(Json(query_handlers::list_clocks(
        &store,
        query.owner_id,
        query.category,
    )))
}

/// GET /round-states/{character_id}
#[instrument(skip(state))]
async fn get_round_state(
    State(state): State<AppState>,
    Path(character_id): Path<Uuid>,
) -> Result<Json<PlayerRoundState>, ApiError> {
    let store = state.authority.store().await?;
    let round_state = query_handlers::get_round_state(&store, character_id)?;
    Ok(Json(round_state))
}

/// Returns the router for state queries.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/characters/{id}", get(get_character))
        .route("/crews/{id}", get(get_crew))
        .route("/clocks", get(list_clocks))
        .route("/round-states/{character_id}", get(get_round_state))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::state::testing::app_state;

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_get_character_returns_view() {
        let (state, fixture) = app_state();
        let app = router().with_state(state);

        let (status, json) = get(app, &format!("/characters/{}", fixture.leader())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["character_id"], fixture.leader().to_string());
        assert_eq!(json["crew_id"], fixture.crew_id.to_string());
        assert_eq!(json["dying"], false);
    }

    #[tokio::test]
    async fn test_unknown_character_returns_404() {
        let (state, _) = app_state();
        let app = router().with_state(state);

        let (status, json) = get(app, &format!("/characters/{}", Uuid::new_v4())).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "aggregate_not_found");
    }

    #[tokio::test]
    async fn test_get_crew_lists_members() {
        let (state, fixture) = app_state();
        let app = router().with_state(state);

        let (status, json) = get(app, &format!("/crews/{}", fixture.crew_id)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["members"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_clocks_is_empty_for_new_owner() {
        let (state, fixture) = app_state();
        let app = router().with_state(state);

        let (status, json) = get(
            app,
            &format!("/clocks?owner_id={}&category=harm", fixture.leader()),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, Value::Array(Vec::new()));
    }

    #[tokio::test]
    async fn test_round_state_defaults_to_decision() {
        let (state, fixture) = app_state();
        let app = router().with_state(state);

        let (status, json) = get(app, &format!("/round-states/{}", fixture.leader())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["state"]["phase"], "decision");
    }
}

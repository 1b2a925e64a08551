//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use ironwake_core::config::RulesConfig;
use ironwake_core::repository::SnapshotRepository;
use ironwake_core::rng::DeterministicRng;
use ironwake_session::application::actor::{AuthorityHandle, spawn_authority};
use ironwake_session::application::authority::Authority;
use ironwake_session::domain::store::GameStore;
use ironwake_snapshot_store::memory::InMemorySnapshotRepository;
use ironwake_test_support::{CrewFixture, FixedTime, MockRng};
use tokio::task::JoinHandle;
use tower::ServiceExt;

use ironwake_api::routes;
use ironwake_api::state::AppState;

/// A running app plus the handles tests poke at directly.
pub struct TestApp {
    pub router: Router,
    pub authority: AuthorityHandle,
    pub fixture: CrewFixture,
    pub task: JoinHandle<()>,
}

impl TestApp {
    /// A fresh router sharing this app's state.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full app over an in-memory repository. `MockRng` rolls every
/// die as a 1. Uses the same route structure as `main.rs`.
pub fn build_test_app() -> TestApp {
    build_test_app_with(Arc::new(InMemorySnapshotRepository::new()), Box::new(MockRng))
}

/// Build the full app with a custom repository and RNG.
pub fn build_test_app_with(
    repository: Arc<dyn SnapshotRepository>,
    rng: Box<dyn DeterministicRng>,
) -> TestApp {
    let rules = Arc::new(RulesConfig::default());
    let fixture = CrewFixture::new(2);
    let store = GameStore {
        roster: fixture.roster(&rules.momentum),
        ..GameStore::default()
    };
    let time = Arc::new(FixedTime(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ));
    let authority = Authority::new(store, rules, time, rng, 16);
    let (handle, task) = spawn_authority(authority);
    let router = routes::router().with_state(AppState::new(handle.clone(), repository));

    TestApp {
        router,
        authority: handle,
        fixture,
        task,
    }
}

/// A request envelope as a peer would send it.
pub fn envelope(
    kind: &str,
    payload: serde_json::Value,
    character_id: uuid::Uuid,
    request_id: &str,
) -> serde_json::Value {
    serde_json::json!({
        "kind": kind,
        "payload": payload,
        "characterId": character_id,
        "requestId": request_id,
    })
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a POST request without a body.
pub async fn post_empty(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

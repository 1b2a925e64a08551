//! Flush through the HTTP surface into Postgres, then restore.
//!
//! Needs `DATABASE_URL`; run with `cargo test -- --ignored`.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use ironwake_session::application::persistence::restore;
use ironwake_snapshot_store::pg_snapshot_repository::PgSnapshotRepository;
use ironwake_test_support::MockRng;
use serde_json::json;
use sqlx::PgPool;

use common::envelope;

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_flushed_store_restores_from_postgres(pool: PgPool) {
    let repository = Arc::new(PgSnapshotRepository::new(pool));
    let app = common::build_test_app_with(repository.clone(), Box::new(MockRng));
    let (_, json) = common::post_json(
        app.router(),
        "/api/v1/rpc",
        &envelope(
            "select",
            json!({ "field": "approach", "value": "force" }),
            app.fixture.leader(),
            "p-1",
        ),
    )
    .await;
    assert_eq!(json["success"], true);

    let (status, report) = common::post_empty(app.router(), "/api/v1/persistence/flush").await;
    let restored = restore(repository.as_ref()).await.unwrap().unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["history_entries"], 1);
    assert_eq!(restored, app.authority.store().await.unwrap());
}

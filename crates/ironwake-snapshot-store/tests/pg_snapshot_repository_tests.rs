//! Integration tests for `PgSnapshotRepository`.
//!
//! These need a running `PostgreSQL` reachable through `DATABASE_URL`; run
//! them with `cargo test -- --ignored`.

use chrono::{TimeZone, Utc};
use ironwake_core::error::DomainError;
use ironwake_core::history::{AggregateRef, CommandHistoryEntry};
use ironwake_core::repository::{SnapshotRepository, StoredSnapshot};
use ironwake_snapshot_store::pg_snapshot_repository::PgSnapshotRepository;
use sqlx::PgPool;
use uuid::Uuid;

/// Helper to build a `StoredSnapshot` with sensible defaults.
fn make_snapshot(version: i64, history_tail: Vec<CommandHistoryEntry>) -> StoredSnapshot {
    StoredSnapshot {
        snapshot_id: Uuid::new_v4(),
        version,
        state: serde_json::json!({"version": version}),
        history_tail,
        taken_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
    }
}

fn make_entry(store_version: u64) -> CommandHistoryEntry {
    CommandHistoryEntry {
        entry_id: Uuid::new_v4(),
        aggregate: AggregateRef::clock(Uuid::new_v4()),
        command_type: "clock.add_segments".to_string(),
        operation_types: vec!["clock.add_segments".to_string()],
        request_id: Some("alpha-1".to_string()),
        correlation_id: Uuid::new_v4(),
        payload: serde_json::json!([{"op": "clock"}]),
        store_version,
        recorded_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
    }
}

// --- load_latest ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_load_latest_returns_none_when_empty(pool: PgPool) {
    let repo = PgSnapshotRepository::new(pool);

    let latest = repo.load_latest().await.unwrap();

    assert!(latest.is_none());
}

// --- save + load_latest round-trip ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_save_and_load_snapshot_with_history(pool: PgPool) {
    let repo = PgSnapshotRepository::new(pool);
    let entries = vec![make_entry(1), make_entry(2)];
    let snapshot = make_snapshot(2, entries.clone());

    repo.save(&snapshot).await.unwrap();

    let loaded = repo.load_latest().await.unwrap().unwrap();
    assert_eq!(loaded.snapshot_id, snapshot.snapshot_id);
    assert_eq!(loaded.version, 2);
    assert_eq!(loaded.state, snapshot.state);
    assert_eq!(loaded.history_tail, entries);
}

// --- ordering ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_load_latest_picks_highest_version(pool: PgPool) {
    let repo = PgSnapshotRepository::new(pool);
    repo.save(&make_snapshot(1, Vec::new())).await.unwrap();
    repo.save(&make_snapshot(4, vec![make_entry(4)])).await.unwrap();

    let loaded = repo.load_latest().await.unwrap().unwrap();

    assert_eq!(loaded.version, 4);
    assert_eq!(loaded.history_tail.len(), 1);
}

// --- concurrency ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_older_snapshot_is_a_concurrency_conflict(pool: PgPool) {
    let repo = PgSnapshotRepository::new(pool);
    repo.save(&make_snapshot(3, Vec::new())).await.unwrap();

    let result = repo.save(&make_snapshot(2, vec![make_entry(2)])).await;

    assert!(matches!(
        result,
        Err(DomainError::ConcurrencyConflict {
            expected: 3,
            actual: 2
        })
    ));
    // Nothing from the rejected save was written.
    let loaded = repo.load_latest().await.unwrap().unwrap();
    assert_eq!(loaded.version, 3);
    assert!(loaded.history_tail.is_empty());
}

// --- schema ---

#[sqlx::test(migrations = false)]
#[ignore = "requires DATABASE_URL"]
async fn test_ensure_schema_is_idempotent(pool: PgPool) {
    let repo = PgSnapshotRepository::new(pool);

    repo.ensure_schema().await.unwrap();
    repo.ensure_schema().await.unwrap();

    assert!(repo.load_latest().await.unwrap().is_none());
}

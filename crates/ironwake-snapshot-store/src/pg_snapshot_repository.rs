//! `PostgreSQL` implementation of the `SnapshotRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use ironwake_core::error::DomainError;
use ironwake_core::history::{AggregateKind, AggregateRef, CommandHistoryEntry};
use ironwake_core::repository::{SnapshotRepository, StoredSnapshot};

use crate::schema::CREATE_SNAPSHOT_TABLES;

/// Serializes concurrent `save` calls across connections.
const SAVE_LOCK_KEY: i64 = 0x1a0_7a4e;

type SnapshotRow = (Uuid, i64, serde_json::Value, DateTime<Utc>);

type HistoryRow = (
    Uuid,
    String,
    Uuid,
    String,
    serde_json::Value,
    Option<String>,
    Uuid,
    serde_json::Value,
    i64,
    DateTime<Utc>,
);

/// PostgreSQL-backed snapshot repository.
#[derive(Debug, Clone)]
pub struct PgSnapshotRepository {
    pool: PgPool,
}

impl PgSnapshotRepository {
    /// Creates a new `PgSnapshotRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tables if they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the statements fail.
    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        sqlx::raw_sql(CREATE_SNAPSHOT_TABLES)
            .execute(&self.pool)
            .await
            .map_err(infrastructure)?;
        Ok(())
    }

    async fn insert_history(
        tx: &mut Transaction<'_, Postgres>,
        snapshot_id: Uuid,
        entry: &CommandHistoryEntry,
    ) -> Result<(), DomainError> {
        let operation_types = serde_json::to_value(&entry.operation_types)
            .map_err(|e| DomainError::Infrastructure(e.to_string()))?;
        let store_version = i64::try_from(entry.store_version)
            .map_err(|_| DomainError::Infrastructure("store version overflow".into()))?;
        sqlx::query(
            r"INSERT INTO command_history
                (entry_id, snapshot_id, aggregate_kind, aggregate_id, command_type,
                 operation_types, request_id, correlation_id, payload, store_version, recorded_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
              ON CONFLICT (entry_id) DO NOTHING",
        )
        .bind(entry.entry_id)
        .bind(snapshot_id)
        .bind(entry.aggregate.kind.to_string())
        .bind(entry.aggregate.id)
        .bind(&entry.command_type)
        .bind(operation_types)
        .bind(&entry.request_id)
        .bind(entry.correlation_id)
        .bind(&entry.payload)
        .bind(store_version)
        .bind(entry.recorded_at)
        .execute(&mut **tx)
        .await
        .map_err(infrastructure)?;
        Ok(())
    }

    async fn load_history(&self, snapshot_id: Uuid) -> Result<Vec<CommandHistoryEntry>, DomainError> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            r"SELECT entry_id, aggregate_kind, aggregate_id, command_type, operation_types,
                     request_id, correlation_id, payload, store_version, recorded_at
              FROM command_history
              WHERE snapshot_id = $1
              ORDER BY store_version, recorded_at",
        )
        .bind(snapshot_id)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;

        rows.into_iter().map(history_entry).collect()
    }
}

#[async_trait]
impl SnapshotRepository for PgSnapshotRepository {
    #[instrument(skip(self))]
    async fn load_latest(&self) -> Result<Option<StoredSnapshot>, DomainError> {
        let row: Option<SnapshotRow> = sqlx::query_as(
            r"SELECT snapshot_id, version, state, taken_at
              FROM store_snapshots
              ORDER BY version DESC, taken_at DESC
              LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;

        let Some((snapshot_id, version, state, taken_at)) = row else {
            return Ok(None);
        };
        let history_tail = self.load_history(snapshot_id).await?;
        Ok(Some(StoredSnapshot {
            snapshot_id,
            version,
            state,
            history_tail,
            taken_at,
        }))
    }

    #[instrument(skip(self, snapshot), fields(version = snapshot.version))]
    async fn save(&self, snapshot: &StoredSnapshot) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(infrastructure)?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SAVE_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(infrastructure)?;

        let latest: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM store_snapshots")
            .fetch_one(&mut *tx)
            .await
            .map_err(infrastructure)?;
        if let Some(latest) = latest.filter(|latest| snapshot.version < *latest) {
            return Err(DomainError::ConcurrencyConflict {
                expected: latest,
                actual: snapshot.version,
            });
        }

        sqlx::query(
            r"INSERT INTO store_snapshots (snapshot_id, version, state, taken_at)
              VALUES ($1, $2, $3, $4)",
        )
        .bind(snapshot.snapshot_id)
        .bind(snapshot.version)
        .bind(&snapshot.state)
        .bind(snapshot.taken_at)
        .execute(&mut *tx)
        .await
        .map_err(infrastructure)?;

        for entry in &snapshot.history_tail {
            Self::insert_history(&mut tx, snapshot.snapshot_id, entry).await?;
        }

        tx.commit().await.map_err(infrastructure)?;
        debug!(
            history_entries = snapshot.history_tail.len(),
            "snapshot saved"
        );
        Ok(())
    }
}

fn infrastructure(error: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(error.to_string())
}

fn history_entry(row: HistoryRow) -> Result<CommandHistoryEntry, DomainError> {
    let (
        entry_id,
        kind,
        aggregate_id,
        command_type,
        operation_types,
        request_id,
        correlation_id,
        payload,
        store_version,
        recorded_at,
    ) = row;
    let kind: AggregateKind = serde_json::from_value(serde_json::Value::String(kind))
        .map_err(|e| DomainError::Infrastructure(format!("aggregate kind: {e}")))?;
    let operation_types: Vec<String> = serde_json::from_value(operation_types)
        .map_err(|e| DomainError::Infrastructure(format!("operation types: {e}")))?;
    let store_version = u64::try_from(store_version)
        .map_err(|_| DomainError::Infrastructure("negative store version".into()))?;
    Ok(CommandHistoryEntry {
        entry_id,
        aggregate: AggregateRef {
            kind,
            id: aggregate_id,
        },
        command_type,
        operation_types,
        request_id,
        correlation_id,
        payload,
        store_version,
        recorded_at,
    })
}

//! Snapshot store database schema.

/// SQL to create the snapshot and command-history tables.
pub const CREATE_SNAPSHOT_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS store_snapshots (
    snapshot_id UUID PRIMARY KEY,
    version     BIGINT NOT NULL,
    state       JSONB NOT NULL,
    taken_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_store_snapshots_version
    ON store_snapshots (version DESC, taken_at DESC);

CREATE TABLE IF NOT EXISTS command_history (
    entry_id        UUID PRIMARY KEY,
    snapshot_id     UUID NOT NULL REFERENCES store_snapshots (snapshot_id),
    aggregate_kind  VARCHAR(32) NOT NULL,
    aggregate_id    UUID NOT NULL,
    command_type    VARCHAR(255) NOT NULL,
    operation_types JSONB NOT NULL,
    request_id      VARCHAR(255),
    correlation_id  UUID NOT NULL,
    payload         JSONB NOT NULL,
    store_version   BIGINT NOT NULL,
    recorded_at     TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_command_history_aggregate
    ON command_history (aggregate_kind, aggregate_id, store_version);

CREATE INDEX IF NOT EXISTS idx_command_history_snapshot
    ON command_history (snapshot_id);
";

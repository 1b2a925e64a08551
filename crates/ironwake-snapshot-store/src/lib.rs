//! Ironwake — Snapshot Store.
//!
//! Adapters for the `SnapshotRepository` port: an in-memory store for tests
//! and single-process tables, and a `PostgreSQL` store for everything else.

pub mod memory;
pub mod pg_snapshot_repository;
pub mod schema;

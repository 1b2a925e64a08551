//! Replication domain model.

pub mod envelopes;
pub mod history;
pub mod operations;
pub mod store;

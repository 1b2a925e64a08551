//! Ironwake — Authoritative Replication Protocol.
//!
//! The only path by which shared game state is mutated on behalf of a peer.
//! One authority task owns the [`GameStore`](domain::store::GameStore) and
//! turns each request into one atomic, audited, broadcast commit; satellite
//! peers keep a replica, send typed requests and filter incoming broadcasts
//! against their own last request id.

pub mod application;
pub mod domain;

//! Ironwake authority server: HTTP and WebSocket surface over the session
//! authority task.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

//! Authority, satellite and persistence services.

pub mod actor;
pub mod authority;
pub mod persistence;
pub mod query_handlers;
pub mod satellite;
pub mod transport;

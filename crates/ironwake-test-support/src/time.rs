//! Test time source — deterministic `TimeSource` implementation for tests.

use chrono::{DateTime, Utc};
use ironwake_core::time::TimeSource;

/// A time source that always returns a fixed point in time.
#[derive(Debug, Clone, Copy)]
pub struct FixedTime(pub DateTime<Utc>);

impl TimeSource for FixedTime {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

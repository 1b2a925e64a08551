//! Shared test doubles and fixtures for the Ironwake session engine.

mod fixtures;
mod repository;
mod rng;
mod time;

pub use fixtures::{CrewFixture, default_ratings};
pub use repository::{FailingSnapshotRepository, RecordingSnapshotRepository};
pub use rng::{MockRng, SequenceRng};
pub use time::FixedTime;

//! Ironwake — Clock Resource Engine.
//!
//! Bounded progress counters ("clocks") and their transition rules: per-owner
//! capacity (harm cap with replacement, single addiction clock), discrete
//! progress sizes, rarity-derived consumable sizes, and shared-pool depletion
//! across consumables that share a scope and label. This crate knows nothing
//! about networking or turn flow.

pub mod domain;

pub use domain::aggregates::{
    Availability, Clock, ClockCategory, ClockKind, NewClock, Rarity,
};
pub use domain::commands::ClockCommand;
pub use domain::engine::{ClockEngine, CreateOutcome, SegmentChange};

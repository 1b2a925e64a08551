//! Ironwake — Characters and Crews.
//!
//! Responsible for character sheets (approach ratings, traits, equipment),
//! crews (membership and the momentum pool) and the roster commands that
//! mutate them.

pub mod domain;

pub use domain::aggregates::{
    Approach, ApproachRatings, Character, Crew, Equipment, ModifierSteps, Trait,
    MAX_APPROACH_RATING,
};
pub use domain::commands::RosterCommand;
pub use domain::roster::Roster;

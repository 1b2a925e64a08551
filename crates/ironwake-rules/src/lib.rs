//! Ironwake — Rules & Resolution.
//!
//! Pure rules with no state: the position and effect ladders, dice pools and
//! roll evaluation, and the momentum/severity/progress tables that turn a
//! resolved roll into numbers the state machine can commit.

pub mod dice;
pub mod ladder;
pub mod tables;

pub use dice::{PoolComponents, RollOutcome, RollResult, evaluate_roll, roll_pool};
pub use ladder::{Effect, Ladder, Position};
pub use tables::{
    consequence_severity, defensive_success_eligible, defensive_trade, momentum_award,
    success_segments,
};

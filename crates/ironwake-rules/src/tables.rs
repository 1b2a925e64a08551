//! Lookup tables that turn position and effect into numbers.

use ironwake_core::config::{MomentumRules, ResolutionRules};

use crate::dice::RollOutcome;
use crate::ladder::{Effect, Ladder, Position};

/// Momentum awarded to the crew when a consequence is accepted.
///
/// Always keyed to the position the action was taken at, never to a position
/// reduced by a defensive success.
#[must_use]
pub fn momentum_award(original_position: Position, rules: &MomentumRules) -> u8 {
    rules.award_by_position[original_position.rung()]
}

/// Consequence severity, in segments, for the effective position.
#[must_use]
pub fn consequence_severity(effective_position: Position, rules: &ResolutionRules) -> u8 {
    rules.severity_by_position[effective_position.rung()]
}

/// Segments a progress clock moves on a successful action.
#[must_use]
pub fn success_segments(position: Position, effect: Effect, rules: &ResolutionRules) -> u8 {
    let base = rules.success_segments_by_effect[effect.rung()];
    if position >= Position::Desperate {
        base.saturating_add(rules.desperate_bonus_segments)
    } else {
        base
    }
}

/// Whether a defensive success may be taken for this roll.
#[must_use]
pub fn defensive_success_eligible(outcome: RollOutcome, effect: Effect) -> bool {
    outcome == RollOutcome::Partial && effect >= Effect::Standard
}

/// Position and effect after trading one rung of each for a softer
/// consequence.
#[must_use]
pub fn defensive_trade(position: Position, effect: Effect) -> (Position, Effect) {
    (position.improved(1), effect.worsened(1))
}

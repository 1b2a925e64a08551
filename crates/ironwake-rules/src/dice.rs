//! Dice pools and roll evaluation.

use ironwake_core::config::ResolutionRules;
use ironwake_core::rng::DeterministicRng;
use serde::{Deserialize, Serialize};

/// Outcome tier of an action roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollOutcome {
    /// Two or more top faces.
    Critical,
    /// Exactly one top face.
    Success,
    /// Best die in the partial band.
    Partial,
    /// Best die below the partial band.
    Failure,
}

impl RollOutcome {
    /// Whether the outcome carries a consequence to resolve.
    #[must_use]
    pub fn needs_consequence(self) -> bool {
        matches!(self, Self::Partial | Self::Failure)
    }
}

impl std::fmt::Display for RollOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::Success => write!(f, "success"),
            Self::Partial => write!(f, "partial"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Contributions to a dice pool, before flooring at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolComponents {
    /// Primary approach rating.
    pub approach: u8,
    /// Secondary approach rating or equipment bonus.
    pub secondary: u8,
    /// Trait bonus.
    pub trait_bonus: u8,
    /// Push bonus.
    pub push: u8,
    /// Flashback bonus.
    pub flashback: u8,
    /// Net equipment dice modifier; may be negative.
    pub equipment: i8,
}

impl PoolComponents {
    /// Total pool size, floored at zero.
    #[must_use]
    pub fn total(&self) -> u8 {
        let positive = u16::from(self.approach)
            + u16::from(self.secondary)
            + u16::from(self.trait_bonus)
            + u16::from(self.push)
            + u16::from(self.flashback);
        let total = i32::from(positive) + i32::from(self.equipment);
        u8::try_from(total.clamp(0, i32::from(u8::MAX))).unwrap_or(u8::MAX)
    }
}

/// A resolved action roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    /// Every die rolled, in roll order.
    pub dice: Vec<u8>,
    /// Pool size the roll was made with (0 for a desperate roll).
    pub pool: u8,
    /// Whether this was a zero-pool "roll two, keep lower" roll.
    pub desperate: bool,
    /// The die that decided the outcome.
    pub kept: u8,
    /// The outcome tier.
    pub outcome: RollOutcome,
}

/// Roll `pool` dice. A pool of zero rolls two dice and keeps the lower.
pub fn roll_pool(
    pool: u8,
    rules: &ResolutionRules,
    rng: &mut dyn DeterministicRng,
) -> RollResult {
    let desperate = pool == 0;
    let count = if desperate { 2 } else { pool };
    let dice: Vec<u8> = (0..count).map(|_| rng.roll_die(rules.die_faces)).collect();
    let (kept, outcome) = evaluate_roll(&dice, desperate, rules);
    RollResult {
        dice,
        pool,
        desperate,
        kept,
        outcome,
    }
}

/// Determine the deciding die and outcome tier for a set of dice.
///
/// A desperate roll keeps the lowest die and can never be critical.
#[must_use]
pub fn evaluate_roll(dice: &[u8], desperate: bool, rules: &ResolutionRules) -> (u8, RollOutcome) {
    let top = rules.die_faces;
    let kept = if desperate {
        dice.iter().copied().min().unwrap_or(1)
    } else {
        dice.iter().copied().max().unwrap_or(1)
    };

    let top_faces = dice.iter().filter(|&&d| d == top).count();
    let outcome = if !desperate && top_faces >= 2 {
        RollOutcome::Critical
    } else if kept >= top {
        RollOutcome::Success
    } else if kept >= rules.partial_threshold {
        RollOutcome::Partial
    } else {
        RollOutcome::Failure
    };
    (kept, outcome)
}

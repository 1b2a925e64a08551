//! Position and effect ladders.
//!
//! Both ladders have four rungs. "Improving" a position moves it toward
//! `Controlled`; improving an effect moves it toward `Spectacular`. Steps past
//! either end of a ladder are absorbed, never wrapped.

use serde::{Deserialize, Serialize};

/// A four-rung ladder that can be stepped up or down.
pub trait Ladder: Copy + Sized {
    /// Rungs from index 0 to 3.
    const RUNGS: [Self; 4];

    /// Index of this value on the ladder.
    fn rung(self) -> usize;

    /// Whether a higher rung index is better for the acting player.
    const HIGHER_IS_BETTER: bool;

    /// Value at `index`, clamped to the ladder.
    #[must_use]
    fn from_rung(index: usize) -> Self {
        Self::RUNGS[index.min(Self::RUNGS.len() - 1)]
    }

    /// Move by `delta` steps; positive deltas improve, negative worsen.
    #[must_use]
    fn adjusted(self, delta: i8) -> Self {
        let signed = if Self::HIGHER_IS_BETTER {
            i16::from(delta)
        } else {
            -i16::from(delta)
        };
        let current = i16::try_from(self.rung()).unwrap_or(3);
        let target = usize::try_from((current + signed).clamp(0, 3)).unwrap_or(0);
        Self::from_rung(target)
    }

    /// Improve by `steps` rungs.
    #[must_use]
    fn improved(self, steps: u8) -> Self {
        let steps = i8::try_from(steps.min(3)).unwrap_or(3);
        self.adjusted(steps)
    }

    /// Worsen by `steps` rungs.
    #[must_use]
    fn worsened(self, steps: u8) -> Self {
        let steps = i8::try_from(steps.min(3)).unwrap_or(3);
        self.adjusted(-steps)
    }
}

/// How dangerous the action is.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// Little is at stake.
    Controlled,
    /// The default position.
    #[default]
    Risky,
    /// Serious trouble on a miss.
    Desperate,
    /// Success is barely conceivable.
    Impossible,
}

impl Ladder for Position {
    const RUNGS: [Self; 4] = [
        Self::Controlled,
        Self::Risky,
        Self::Desperate,
        Self::Impossible,
    ];
    const HIGHER_IS_BETTER: bool = false;

    fn rung(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Controlled => "controlled",
            Self::Risky => "risky",
            Self::Desperate => "desperate",
            Self::Impossible => "impossible",
        };
        f.write_str(name)
    }
}

/// How much the action accomplishes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Partial or weak impact.
    Limited,
    /// The default effect.
    #[default]
    Standard,
    /// More than usual.
    Great,
    /// Far beyond expectations.
    Spectacular,
}

impl Ladder for Effect {
    const RUNGS: [Self; 4] = [
        Self::Limited,
        Self::Standard,
        Self::Great,
        Self::Spectacular,
    ];
    const HIGHER_IS_BETTER: bool = true;

    fn rung(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Limited => "limited",
            Self::Standard => "standard",
            Self::Great => "great",
            Self::Spectacular => "spectacular",
        };
        f.write_str(name)
    }
}

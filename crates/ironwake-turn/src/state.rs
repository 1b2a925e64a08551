//! Round-state types.

use ironwake_character::Approach;
use ironwake_rules::{Effect, PoolComponents, Position, RollResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The phase of a character's turn, without phase data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    /// Choosing the action.
    Decision,
    /// Action committed, dice not yet rolled.
    Rolling,
    /// Rolling addiction for a stimulant.
    StimulantRolling,
    /// The stimulant filled the addiction clock.
    StimulantLocked,
    /// Negotiating the consequence of a partial or failed roll.
    AwaitingConsequence,
    /// Consequence of a failure applied.
    ApplyingEffects,
    /// Choosing a clock to move after a success.
    SuccessResolution,
    /// Turn over.
    Complete,
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Decision => "decision",
            Self::Rolling => "rolling",
            Self::StimulantRolling => "stimulant_rolling",
            Self::StimulantLocked => "stimulant_locked",
            Self::AwaitingConsequence => "awaiting_consequence",
            Self::ApplyingEffects => "applying_effects",
            Self::SuccessResolution => "success_resolution",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Where the second contribution to the pool comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SecondarySource {
    /// A second approach rating.
    Synergy {
        /// The assisting approach.
        approach: Approach,
    },
    /// An equipped item's bonus dice.
    Equipment {
        /// The item.
        item_id: Uuid,
    },
}

/// What a push buys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushMode {
    /// One extra die.
    Dice,
    /// One step of effect.
    Effect,
}

/// Trait contribution being drafted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TraitDraft {
    /// Use an existing trait.
    Use {
        /// The trait.
        trait_id: Uuid,
    },
    /// Establish a new trait through a flashback, paid with momentum.
    Flashback {
        /// Identifier for the new trait.
        trait_id: Uuid,
        /// Name of the new trait.
        name: String,
    },
}

/// The action being put together in `Decision`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSelection {
    /// Primary approach.
    pub approach: Option<Approach>,
    /// Secondary source.
    pub secondary: Option<SecondarySource>,
    /// Declared position, before equipment modifiers.
    pub position: Position,
    /// Declared effect, before equipment modifiers.
    pub effect: Effect,
    /// Optional push.
    pub push: Option<PushMode>,
    /// Optional trait or flashback.
    pub trait_draft: Option<TraitDraft>,
}

/// An action locked in by `commit_action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedAction {
    /// Primary approach.
    pub approach: Approach,
    /// Pool contributions.
    pub pool: PoolComponents,
    /// Position the action is taken at, after equipment modifiers. Momentum
    /// awards are keyed to this value.
    pub position: Position,
    /// Effect after equipment modifiers and push.
    pub effect: Effect,
    /// Momentum spent on push and flashback.
    pub momentum_spent: u8,
}

/// A clock a consequence lands on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum ClockTarget {
    /// An existing clock.
    Existing {
        /// The clock.
        clock_id: Uuid,
    },
    /// A clock created on the fly.
    New {
        /// Label for the new clock.
        label: String,
        /// Size, for new crew clocks.
        #[serde(default)]
        size: Option<u8>,
    },
}

/// What the consequence does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsequenceKind {
    /// Harm to the acting character or another character.
    Harm {
        /// Character taking the harm.
        target_character_id: Uuid,
        /// Harm clock to fill.
        clock: ClockTarget,
    },
    /// A crew-level threat or progress clock advances.
    CrewClock {
        /// Clock to advance.
        clock: ClockTarget,
    },
}

/// The consequence transaction negotiated in `AwaitingConsequence`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsequenceDraft {
    /// Chosen consequence, if any yet.
    pub kind: Option<ConsequenceKind>,
    /// Trade one step of position and effect for a softer consequence.
    pub defensive_success: bool,
}

/// Summary of an applied failure consequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedConsequence {
    /// Segments the consequence called for.
    pub severity: u8,
    /// Clock that received the segments.
    pub clock_id: Uuid,
    /// Momentum the crew actually gained.
    pub momentum_awarded: u8,
    /// Harm target now has a full harm clock.
    pub target_dying: bool,
}

/// Phase plus the data only that phase carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TurnState {
    /// Choosing the action.
    #[default]
    Decision,
    /// Waiting for the roll.
    Rolling,
    /// Stimulant in use; the draft is held for the return trip.
    StimulantRolling {
        /// Held consequence draft.
        draft: ConsequenceDraft,
    },
    /// Addiction clock filled; the draft still needs resolving.
    StimulantLocked {
        /// Held consequence draft.
        draft: ConsequenceDraft,
    },
    /// Negotiating the consequence.
    AwaitingConsequence {
        /// The consequence draft.
        draft: ConsequenceDraft,
    },
    /// Failure consequence applied.
    ApplyingEffects {
        /// What was applied.
        applied: AppliedConsequence,
    },
    /// Choosing a clock to move. A partial success keeps its draft for the
    /// defensive-success flag.
    SuccessResolution {
        /// Draft carried over from a partial success.
        draft: Option<ConsequenceDraft>,
    },
    /// Turn over.
    Complete,
}

impl TurnState {
    /// The phase of this state.
    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        match self {
            Self::Decision => TurnPhase::Decision,
            Self::Rolling => TurnPhase::Rolling,
            Self::StimulantRolling { .. } => TurnPhase::StimulantRolling,
            Self::StimulantLocked { .. } => TurnPhase::StimulantLocked,
            Self::AwaitingConsequence { .. } => TurnPhase::AwaitingConsequence,
            Self::ApplyingEffects { .. } => TurnPhase::ApplyingEffects,
            Self::SuccessResolution { .. } => TurnPhase::SuccessResolution,
            Self::Complete => TurnPhase::Complete,
        }
    }
}

/// Ephemeral per-character turn record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRoundState {
    /// Owning character.
    pub character_id: Uuid,
    /// Current phase and its data.
    pub state: TurnState,
    /// Selection being built in `Decision`.
    pub selection: ActionSelection,
    /// Action committed for this turn.
    pub committed: Option<CommittedAction>,
    /// Most recent action roll.
    pub last_roll: Option<RollResult>,
    /// Most recent stimulant die.
    pub last_stimulant_roll: Option<u8>,
}

impl PlayerRoundState {
    /// A fresh record in `Decision`.
    #[must_use]
    pub fn new(character_id: Uuid) -> Self {
        Self {
            character_id,
            state: TurnState::Decision,
            selection: ActionSelection::default(),
            committed: None,
            last_roll: None,
            last_stimulant_roll: None,
        }
    }

    /// The current phase.
    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        self.state.phase()
    }
}

//! The turn resolution state machine.
//!
//! ```text
//! Decision ──commit──▶ Rolling ──roll──▶ SuccessResolution ──resolve──▶ Complete
//!                         ▲         └──▶ AwaitingConsequence ──accept (failure)──▶ ApplyingEffects ──close──▶ Complete
//!                         │                 │   ▲        └──accept (partial)──▶ SuccessResolution
//!                         │          stimulant  │ return
//!                         │                 ▼   │
//!                         └──not filled── StimulantRolling ──filled──▶ StimulantLocked
//! ```
//!
//! Any phase returns to `Decision` on cancel; `Complete` re-arms to
//! `Decision` on begin-turn.

use ironwake_character::{Approach, RosterCommand};
use ironwake_clocks::{ClockCategory, ClockCommand, CreateOutcome, NewClock};
use ironwake_core::command::Command;
use ironwake_core::config::RulesConfig;
use ironwake_core::error::DomainError;
use ironwake_core::rng::DeterministicRng;
use ironwake_rules::{
    Effect, Position, RollOutcome, consequence_severity, defensive_success_eligible,
    defensive_trade, momentum_award, roll_pool, success_segments,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::context::TurnContext;
use crate::pool::assemble_action;
use crate::state::{
    AppliedConsequence, ClockTarget, ConsequenceDraft, ConsequenceKind, PlayerRoundState,
    PushMode, SecondarySource, TraitDraft, TurnPhase, TurnState,
};

/// Label of an addiction clock created by a stimulant.
pub const ADDICTION_CLOCK_LABEL: &str = "Addiction";

/// A change to the shared store that accompanies a round-state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum TurnEffect {
    /// A clock mutation.
    Clock {
        /// The mutation.
        command: ClockCommand,
    },
    /// A roster mutation.
    Roster {
        /// The mutation.
        command: RosterCommand,
    },
}

impl TurnEffect {
    /// Type name of the wrapped command.
    #[must_use]
    pub fn command_type(&self) -> &'static str {
        match self {
            Self::Clock { command } => command.command_type(),
            Self::Roster { command } => command.command_type(),
        }
    }
}

impl From<ClockCommand> for TurnEffect {
    fn from(command: ClockCommand) -> Self {
        Self::Clock { command }
    }
}

impl From<RosterCommand> for TurnEffect {
    fn from(command: RosterCommand) -> Self {
        Self::Roster { command }
    }
}

/// Result of a machine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Phase the call started from; commit only if it is still current.
    pub expected: TurnPhase,
    /// Next round state.
    pub round_state: PlayerRoundState,
    /// Store changes to commit with the round state, in order.
    pub effects: Vec<TurnEffect>,
    /// Characters left with a full harm clock by this call.
    pub dying: Vec<Uuid>,
}

/// One selection edit made in `Decision`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum SelectionEdit {
    /// Primary approach.
    Approach(Option<Approach>),
    /// Secondary source.
    Secondary(Option<SecondarySource>),
    /// Declared position.
    Position(Position),
    /// Declared effect.
    Effect(Effect),
    /// Push mode.
    Push(Option<PushMode>),
    /// Trait or flashback.
    Trait(Option<TraitDraft>),
}

/// One edit to the consequence draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "edit", rename_all = "snake_case")]
pub enum DraftEdit {
    /// Choose (or clear) the consequence.
    SetKind {
        /// The consequence.
        kind: Option<ConsequenceKind>,
    },
    /// Take or drop the defensive success.
    SetDefensive {
        /// Whether to take it.
        enabled: bool,
    },
}

/// What to do with the success segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "choice", rename_all = "snake_case")]
pub enum SuccessChoice {
    /// Move a progress clock; countdown clocks are reduced.
    Clock {
        /// The clock.
        clock_id: Uuid,
    },
    /// Move nothing.
    Skip,
}

/// Computes round-state transitions against a read-only store view.
#[derive(Debug, Clone, Copy)]
pub struct TurnMachine<'a> {
    rules: &'a RulesConfig,
}

impl<'a> TurnMachine<'a> {
    /// A machine using `rules`.
    #[must_use]
    pub fn new(rules: &'a RulesConfig) -> Self {
        Self { rules }
    }

    /// Edit the selection. Only legal in `Decision`; not a transition.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for an unknown character and
    /// `DomainError::Validation` outside `Decision`.
    #[instrument(skip(self, ctx))]
    pub fn select(
        &self,
        ctx: &dyn TurnContext,
        character_id: Uuid,
        edit: SelectionEdit,
    ) -> Result<TurnOutcome, DomainError> {
        let mut round = current(ctx, character_id)?;
        require_phase(&round, TurnPhase::Decision, "edit the selection")?;

        let selection = &mut round.selection;
        match edit {
            SelectionEdit::Approach(approach) => selection.approach = approach,
            SelectionEdit::Secondary(source) => selection.secondary = source,
            SelectionEdit::Position(position) => selection.position = position,
            SelectionEdit::Effect(effect) => selection.effect = effect,
            SelectionEdit::Push(push) => selection.push = push,
            SelectionEdit::Trait(draft) => selection.trait_draft = draft,
        }
        Ok(finish(TurnPhase::Decision, round, Vec::new()))
    }

    /// Commit the selected action: `Decision` → `Rolling`.
    ///
    /// Momentum for push and flashback is debited in the same batch and a
    /// flashback trait is added to the character.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside `Decision`, for an invalid
    /// selection, or when the crew cannot pay the momentum cost.
    #[instrument(skip(self, ctx))]
    pub fn commit_action(
        &self,
        ctx: &dyn TurnContext,
        character_id: Uuid,
    ) -> Result<TurnOutcome, DomainError> {
        let mut round = current(ctx, character_id)?;
        require_phase(&round, TurnPhase::Decision, "commit an action")?;

        let character = ctx.roster().character(character_id)?;
        let assembly = assemble_action(character, &round.selection, &self.rules.momentum)?;

        let mut effects = Vec::new();
        if assembly.momentum_cost > 0 {
            let crew = ctx.roster().crew_of(character_id)?;
            if crew.momentum < assembly.momentum_cost {
                return Err(DomainError::Validation(format!(
                    "crew {} has {} momentum, {} required",
                    crew.id, crew.momentum, assembly.momentum_cost
                )));
            }
            effects.push(
                RosterCommand::AdjustMomentum {
                    crew_id: crew.id,
                    delta: -i16::from(assembly.momentum_cost),
                }
                .into(),
            );
        }
        if let Some(new_trait) = assembly.flashback_trait {
            effects.push(
                RosterCommand::AddTrait {
                    character_id,
                    new_trait,
                }
                .into(),
            );
        }

        info!(
            pool = assembly.action.pool.total(),
            position = %assembly.action.position,
            effect = %assembly.action.effect,
            "action committed"
        );
        round.committed = Some(assembly.action);
        round.last_roll = None;
        round.state = TurnState::Rolling;
        Ok(finish(TurnPhase::Decision, round, effects))
    }

    /// Roll the committed pool: `Rolling` → `SuccessResolution` on a critical
    /// or full success, otherwise `AwaitingConsequence`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside `Rolling`.
    #[instrument(skip(self, ctx, rng))]
    pub fn roll(
        &self,
        ctx: &dyn TurnContext,
        character_id: Uuid,
        rng: &mut dyn DeterministicRng,
    ) -> Result<TurnOutcome, DomainError> {
        let mut round = current(ctx, character_id)?;
        require_phase(&round, TurnPhase::Rolling, "roll")?;
        let committed = round
            .committed
            .as_ref()
            .ok_or_else(|| DomainError::Validation("no action committed".into()))?;

        let result = roll_pool(committed.pool.total(), &self.rules.resolution, rng);
        info!(dice = ?result.dice, outcome = %result.outcome, "action rolled");

        round.state = if result.outcome.needs_consequence() {
            TurnState::AwaitingConsequence {
                draft: ConsequenceDraft::default(),
            }
        } else {
            TurnState::SuccessResolution { draft: None }
        };
        round.last_roll = Some(result);
        Ok(finish(TurnPhase::Rolling, round, Vec::new()))
    }

    /// Edit the consequence draft in `AwaitingConsequence`. The caller
    /// commits the result silently.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside `AwaitingConsequence`, for a
    /// consequence aimed at the wrong clock, or for a defensive success the
    /// roll does not allow.
    #[instrument(skip(self, ctx))]
    pub fn update_draft(
        &self,
        ctx: &dyn TurnContext,
        character_id: Uuid,
        edit: DraftEdit,
    ) -> Result<PlayerRoundState, DomainError> {
        let mut round = current(ctx, character_id)?;
        let phase = round.phase();
        let TurnState::AwaitingConsequence { draft } = &mut round.state else {
            return Err(illegal(phase, "edit the consequence"));
        };

        match edit {
            DraftEdit::SetKind { kind } => {
                if let Some(kind) = &kind {
                    check_consequence_target(ctx, character_id, kind)?;
                }
                draft.kind = kind;
            }
            DraftEdit::SetDefensive { enabled } => {
                if enabled {
                    let outcome = round.last_roll.as_ref().map(|r| r.outcome);
                    let effect = round.committed.as_ref().map(|c| c.effect);
                    let eligible = outcome
                        .zip(effect)
                        .is_some_and(|(o, e)| defensive_success_eligible(o, e));
                    if !eligible {
                        return Err(DomainError::Validation(
                            "defensive success needs a partial success at standard effect or better"
                                .into(),
                        ));
                    }
                }
                draft.defensive_success = enabled;
            }
        }
        debug!("consequence draft updated");
        Ok(round)
    }

    /// Elect a stimulant: `AwaitingConsequence` → `StimulantRolling`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside `AwaitingConsequence`, when
    /// the character has no crew, or when the crew's addiction clock is full.
    #[instrument(skip(self, ctx))]
    pub fn use_stimulant(
        &self,
        ctx: &dyn TurnContext,
        character_id: Uuid,
    ) -> Result<TurnOutcome, DomainError> {
        let mut round = current(ctx, character_id)?;
        let TurnState::AwaitingConsequence { draft } = &round.state else {
            return Err(illegal(round.phase(), "use a stimulant"));
        };
        let draft = draft.clone();

        let crew = ctx.roster().crew_of(character_id)?;
        if ctx
            .clocks()
            .addiction_clock(crew.id)
            .is_some_and(|clock| clock.frozen)
        {
            return Err(DomainError::Validation(format!(
                "crew {} is locked out of stimulants",
                crew.id
            )));
        }

        round.state = TurnState::StimulantRolling { draft };
        Ok(finish(TurnPhase::AwaitingConsequence, round, Vec::new()))
    }

    /// Roll addiction for the stimulant. A result that fills the crew's
    /// addiction clock goes to `StimulantLocked`; otherwise the action is
    /// rerolled from `Rolling`. The addiction clock is created if missing.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside `StimulantRolling` or when
    /// the crew's addiction clock is full.
    #[instrument(skip(self, ctx, rng))]
    pub fn resolve_stimulant(
        &self,
        ctx: &dyn TurnContext,
        character_id: Uuid,
        rng: &mut dyn DeterministicRng,
    ) -> Result<TurnOutcome, DomainError> {
        let mut round = current(ctx, character_id)?;
        let TurnState::StimulantRolling { draft } = &round.state else {
            return Err(illegal(round.phase(), "resolve a stimulant"));
        };
        let draft = draft.clone();
        let crew = ctx.roster().crew_of(character_id)?;

        let mut effects = Vec::new();
        let (clock_id, segments, max) = match ctx.clocks().addiction_clock(crew.id) {
            Some(clock) if clock.frozen => {
                return Err(DomainError::Validation(format!(
                    "crew {} is locked out of stimulants",
                    crew.id
                )));
            }
            Some(clock) => (clock.id, clock.segments, clock.max),
            None => {
                let new_clock = NewClock::addiction(crew.id, ADDICTION_CLOCK_LABEL);
                let clock_id = new_clock.id;
                effects.push(ClockCommand::Create { clock: new_clock }.into());
                (clock_id, 0, self.rules.clocks.addiction_max)
            }
        };

        let roll = rng.roll_die(self.rules.resolution.stimulant_die_faces);
        let remaining = max.saturating_sub(segments);
        let locked = roll >= remaining;
        let amount = roll.min(remaining);
        if amount > 0 {
            effects.push(ClockCommand::AddSegments { clock_id, amount }.into());
        }

        info!(roll, locked, "stimulant resolved");
        round.last_stimulant_roll = Some(roll);
        if locked {
            round.state = TurnState::StimulantLocked { draft };
        } else {
            round.state = TurnState::Rolling;
            round.last_roll = None;
        }
        Ok(finish(TurnPhase::StimulantRolling, round, effects))
    }

    /// Leave the lock-out screen: `StimulantLocked` → `AwaitingConsequence`
    /// with the held draft.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside `StimulantLocked`.
    pub fn return_from_lock(
        &self,
        ctx: &dyn TurnContext,
        character_id: Uuid,
    ) -> Result<TurnOutcome, DomainError> {
        let mut round = current(ctx, character_id)?;
        let TurnState::StimulantLocked { draft } = &round.state else {
            return Err(illegal(round.phase(), "return from the stimulant lock"));
        };
        round.state = TurnState::AwaitingConsequence {
            draft: draft.clone(),
        };
        Ok(finish(TurnPhase::StimulantLocked, round, Vec::new()))
    }

    /// Accept the drafted consequence.
    ///
    /// Severity follows the effective position (after a defensive trade);
    /// momentum follows the original position. A failure goes to
    /// `ApplyingEffects` and drops the draft; a partial success goes to
    /// `SuccessResolution` and keeps it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside `AwaitingConsequence`, with
    /// no consequence chosen, or when the target is invalid.
    #[instrument(skip(self, ctx))]
    pub fn accept_consequence(
        &self,
        ctx: &dyn TurnContext,
        character_id: Uuid,
    ) -> Result<TurnOutcome, DomainError> {
        let mut round = current(ctx, character_id)?;
        let TurnState::AwaitingConsequence { draft } = &round.state else {
            return Err(illegal(round.phase(), "accept a consequence"));
        };
        let draft = draft.clone();
        let kind = draft
            .kind
            .clone()
            .ok_or_else(|| DomainError::Validation("no consequence chosen".into()))?;
        let roll_outcome = round
            .last_roll
            .as_ref()
            .map(|r| r.outcome)
            .ok_or_else(|| DomainError::Validation("no roll to resolve".into()))?;
        let committed = round
            .committed
            .as_ref()
            .ok_or_else(|| DomainError::Validation("no action committed".into()))?;
        if draft.defensive_success && !defensive_success_eligible(roll_outcome, committed.effect)
        {
            return Err(DomainError::Validation(
                "defensive success is not available for this roll".into(),
            ));
        }

        let original = committed.position;
        let effective = if draft.defensive_success {
            defensive_trade(committed.position, committed.effect).0
        } else {
            original
        };
        let severity = consequence_severity(effective, &self.rules.resolution);

        let mut effects = Vec::new();
        let mut dying = Vec::new();
        check_consequence_target(ctx, character_id, &kind)?;
        let (clock_id, target_dying) = match &kind {
            ConsequenceKind::Harm {
                target_character_id,
                clock,
            } => {
                let (clock_id, full) =
                    self.harm_effects(ctx, *target_character_id, clock, severity, &mut effects)?;
                if full {
                    dying.push(*target_character_id);
                }
                (clock_id, full)
            }
            ConsequenceKind::CrewClock { clock } => (
                self.crew_clock_effects(ctx, character_id, clock, severity, &mut effects)?,
                false,
            ),
        };

        let mut momentum_awarded = 0;
        if let Some(crew_id) = ctx.roster().character(character_id)?.crew_id {
            let crew = ctx.roster().crew(crew_id)?;
            let award = momentum_award(original, &self.rules.momentum);
            momentum_awarded = award.min(self.rules.momentum.max.saturating_sub(crew.momentum));
            if award > 0 {
                effects.push(
                    RosterCommand::AdjustMomentum {
                        crew_id,
                        delta: i16::from(award),
                    }
                    .into(),
                );
            }
        }

        info!(
            severity,
            %effective,
            momentum_awarded,
            target_dying,
            "consequence accepted"
        );
        round.state = match roll_outcome {
            RollOutcome::Failure => TurnState::ApplyingEffects {
                applied: AppliedConsequence {
                    severity,
                    clock_id,
                    momentum_awarded,
                    target_dying,
                },
            },
            RollOutcome::Partial => TurnState::SuccessResolution { draft: Some(draft) },
            RollOutcome::Critical | RollOutcome::Success => {
                return Err(DomainError::Validation(format!(
                    "a {roll_outcome} has no consequence"
                )));
            }
        };

        let mut outcome = finish(TurnPhase::AwaitingConsequence, round, effects);
        outcome.dying = dying;
        Ok(outcome)
    }

    /// Pick (or skip) the clock that receives the success segments and end
    /// the turn: `SuccessResolution` → `Complete`.
    ///
    /// The segment count follows position and effect, traded down if the
    /// carried draft took a defensive success. Countdown clocks are reduced;
    /// other progress clocks advance and fill to max rather than overflow.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside `SuccessResolution` or when
    /// the clock is not an unfrozen progress clock.
    #[instrument(skip(self, ctx))]
    pub fn resolve_success(
        &self,
        ctx: &dyn TurnContext,
        character_id: Uuid,
        choice: SuccessChoice,
    ) -> Result<TurnOutcome, DomainError> {
        let mut round = current(ctx, character_id)?;
        let TurnState::SuccessResolution { draft } = &round.state else {
            return Err(illegal(round.phase(), "resolve a success"));
        };
        let committed = round
            .committed
            .as_ref()
            .ok_or_else(|| DomainError::Validation("no action committed".into()))?;
        let (position, effect) = if draft.as_ref().is_some_and(|d| d.defensive_success) {
            defensive_trade(committed.position, committed.effect)
        } else {
            (committed.position, committed.effect)
        };
        let amount = success_segments(position, effect, &self.rules.resolution);

        let mut effects = Vec::new();
        if let SuccessChoice::Clock { clock_id } = choice {
            let clock = ctx.clocks().require(clock_id)?;
            if clock.category() != ClockCategory::Progress {
                return Err(DomainError::Validation(format!(
                    "clock {clock_id} is not a progress clock"
                )));
            }
            if clock.is_countdown() {
                effects.push(ClockCommand::ClearSegments { clock_id, amount }.into());
            } else {
                if clock.frozen {
                    return Err(DomainError::Validation(format!(
                        "clock {clock_id} is frozen"
                    )));
                }
                let add = amount.min(clock.remaining());
                if add > 0 {
                    effects.push(ClockCommand::AddSegments { clock_id, amount: add }.into());
                }
            }
        }

        info!(amount, ?choice, "success resolved");
        round.state = TurnState::Complete;
        Ok(finish(TurnPhase::SuccessResolution, round, effects))
    }

    /// Close the effects screen: `ApplyingEffects` → `Complete`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside `ApplyingEffects`.
    pub fn close_turn(
        &self,
        ctx: &dyn TurnContext,
        character_id: Uuid,
    ) -> Result<TurnOutcome, DomainError> {
        let mut round = current(ctx, character_id)?;
        require_phase(&round, TurnPhase::ApplyingEffects, "close the turn")?;
        round.state = TurnState::Complete;
        Ok(finish(TurnPhase::ApplyingEffects, round, Vec::new()))
    }

    /// Start the next turn: `Complete` → a fresh `Decision`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` outside `Complete`.
    pub fn begin_turn(
        &self,
        ctx: &dyn TurnContext,
        character_id: Uuid,
    ) -> Result<TurnOutcome, DomainError> {
        let round = current(ctx, character_id)?;
        require_phase(&round, TurnPhase::Complete, "begin a turn")?;
        Ok(finish(
            TurnPhase::Complete,
            PlayerRoundState::new(character_id),
            Vec::new(),
        ))
    }

    /// Abandon the turn from any phase, discarding every draft.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for an unknown character.
    pub fn cancel(
        &self,
        ctx: &dyn TurnContext,
        character_id: Uuid,
    ) -> Result<TurnOutcome, DomainError> {
        let round = current(ctx, character_id)?;
        debug!(phase = %round.phase(), "turn cancelled");
        Ok(finish(
            round.phase(),
            PlayerRoundState::new(character_id),
            Vec::new(),
        ))
    }

    fn harm_effects(
        &self,
        ctx: &dyn TurnContext,
        target_id: Uuid,
        target: &ClockTarget,
        severity: u8,
        effects: &mut Vec<TurnEffect>,
    ) -> Result<(Uuid, bool), DomainError> {
        let engine = ctx.clocks();
        let (clock_id, segments, max) = match target {
            ClockTarget::Existing { clock_id } => {
                let clock = engine.require(*clock_id)?;
                (clock.id, clock.segments, clock.max)
            }
            ClockTarget::New { label, .. } => {
                let character = ctx.roster().character(target_id)?;
                let scope_id = character.crew_id.unwrap_or(target_id);
                let new_clock = NewClock::harm(target_id, scope_id, label.clone());
                let placement = match engine.preview_create(&self.rules.clocks, &new_clock)? {
                    CreateOutcome::Created { clock_id } => (clock_id, 0, self.rules.clocks.harm_max),
                    CreateOutcome::Replaced { clock_id, .. } => {
                        let replaced = engine.require(clock_id)?;
                        (clock_id, replaced.segments, replaced.max)
                    }
                };
                effects.push(ClockCommand::Create { clock: new_clock }.into());
                placement
            }
        };

        let amount = severity.min(max - segments);
        if amount > 0 {
            effects.push(ClockCommand::AddSegments { clock_id, amount }.into());
        }
        Ok((clock_id, segments + amount == max))
    }

    fn crew_clock_effects(
        &self,
        ctx: &dyn TurnContext,
        character_id: Uuid,
        target: &ClockTarget,
        severity: u8,
        effects: &mut Vec<TurnEffect>,
    ) -> Result<Uuid, DomainError> {
        let engine = ctx.clocks();
        let (clock_id, remaining) = match target {
            ClockTarget::Existing { clock_id } => {
                let clock = engine.require(*clock_id)?;
                (clock.id, clock.remaining())
            }
            ClockTarget::New { label, size } => {
                let crew = ctx.roster().crew_of(character_id)?;
                let size = size.ok_or_else(|| {
                    DomainError::Validation("a new crew clock needs a size".into())
                })?;
                let new_clock = NewClock::progress(crew.id, crew.id, label.clone(), size, true);
                let clock_id = engine.preview_create(&self.rules.clocks, &new_clock)?.clock_id();
                effects.push(ClockCommand::Create { clock: new_clock }.into());
                (clock_id, size)
            }
        };

        let amount = severity.min(remaining);
        if amount > 0 {
            effects.push(ClockCommand::AddSegments { clock_id, amount }.into());
        }
        Ok(clock_id)
    }
}

fn current(ctx: &dyn TurnContext, character_id: Uuid) -> Result<PlayerRoundState, DomainError> {
    ctx.roster().character(character_id)?;
    Ok(ctx
        .round_state(character_id)
        .cloned()
        .unwrap_or_else(|| PlayerRoundState::new(character_id)))
}

fn illegal(phase: TurnPhase, action: &str) -> DomainError {
    DomainError::Validation(format!("cannot {action} during {phase}"))
}

fn require_phase(
    round: &PlayerRoundState,
    phase: TurnPhase,
    action: &str,
) -> Result<(), DomainError> {
    if round.phase() == phase {
        Ok(())
    } else {
        Err(illegal(round.phase(), action))
    }
}

fn finish(expected: TurnPhase, round_state: PlayerRoundState, effects: Vec<TurnEffect>) -> TurnOutcome {
    TurnOutcome {
        expected,
        round_state,
        effects,
        dying: Vec::new(),
    }
}

/// Check that a consequence points at clocks it may land on.
fn check_consequence_target(
    ctx: &dyn TurnContext,
    character_id: Uuid,
    kind: &ConsequenceKind,
) -> Result<(), DomainError> {
    let (expected_owner, expected_category, target) = match kind {
        ConsequenceKind::Harm {
            target_character_id,
            clock,
        } => {
            ctx.roster().character(*target_character_id)?;
            (*target_character_id, ClockCategory::Harm, clock)
        }
        ConsequenceKind::CrewClock { clock } => {
            let crew = ctx.roster().crew_of(character_id)?;
            (crew.id, ClockCategory::Progress, clock)
        }
    };

    match target {
        ClockTarget::Existing { clock_id } => {
            let clock = ctx.clocks().require(*clock_id)?;
            if clock.owner_id != expected_owner || clock.category() != expected_category {
                return Err(DomainError::Validation(format!(
                    "clock {clock_id} is not a {expected_category} clock of {expected_owner}"
                )));
            }
            if clock.frozen {
                return Err(DomainError::Validation(format!(
                    "consequence targets frozen clock {clock_id}"
                )));
            }
            Ok(())
        }
        ClockTarget::New { label, .. } if label.trim().is_empty() => Err(DomainError::Validation(
            "clock label must not be empty".into(),
        )),
        ClockTarget::New { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use ironwake_character::Roster;
    use ironwake_clocks::ClockEngine;
    use ironwake_test_support::{CrewFixture, MockRng, SequenceRng};

    struct Table {
        rules: RulesConfig,
        roster: Roster,
        clocks: ClockEngine,
        rounds: HashMap<Uuid, PlayerRoundState>,
    }

    impl TurnContext for Table {
        fn roster(&self) -> &Roster {
            &self.roster
        }

        fn clocks(&self) -> &ClockEngine {
            &self.clocks
        }

        fn round_state(&self, character_id: Uuid) -> Option<&PlayerRoundState> {
            self.rounds.get(&character_id)
        }
    }

    impl Table {
        fn new() -> (Self, CrewFixture) {
            let rules = RulesConfig::default();
            let fixture = CrewFixture::new(2);
            let roster = fixture.roster(&rules.momentum);
            let table = Self {
                rules,
                roster,
                clocks: ClockEngine::new(),
                rounds: HashMap::new(),
            };
            (table, fixture)
        }

        fn commit(&mut self, outcome: TurnOutcome) -> PlayerRoundState {
            for effect in outcome.effects {
                match effect {
                    TurnEffect::Clock { command } => {
                        command.apply(&mut self.clocks, &self.rules.clocks).unwrap();
                    }
                    TurnEffect::Roster { command } => {
                        command.apply(&mut self.roster, &self.rules.momentum).unwrap();
                    }
                }
            }
            let state = outcome.round_state;
            self.rounds.insert(state.character_id, state.clone());
            state
        }

        fn run<F>(&mut self, step: F) -> PlayerRoundState
        where
            F: FnOnce(&TurnMachine<'_>, &Self) -> Result<TurnOutcome, DomainError>,
        {
            let rules = self.rules.clone();
            let machine = TurnMachine::new(&rules);
            let outcome = step(&machine, self).unwrap();
            self.commit(outcome)
        }

        fn momentum(&self, crew_id: Uuid) -> u8 {
            self.roster.crew(crew_id).unwrap().momentum
        }

        fn choose(&mut self, id: Uuid, edit: SelectionEdit) {
            self.run(|m, t| m.select(t, id, edit));
        }

        fn draft(&mut self, id: Uuid, edit: DraftEdit) {
            let rules = self.rules.clone();
            let state = TurnMachine::new(&rules).update_draft(self, id, edit).unwrap();
            self.rounds.insert(id, state);
        }

        /// Commit a force action at `position` and roll `dice`.
        fn act(&mut self, id: Uuid, position: Position, dice: Vec<u32>) -> PlayerRoundState {
            self.choose(id, SelectionEdit::Approach(Some(Approach::Force)));
            self.choose(id, SelectionEdit::Position(position));
            self.run(|m, t| m.commit_action(t, id));
            self.run(|m, t| m.roll(t, id, &mut SequenceRng::new(dice)))
        }
    }

    #[test]
    fn test_fresh_character_starts_in_decision() {
        let (table, fixture) = Table::new();
        let rules = RulesConfig::default();
        let outcome = TurnMachine::new(&rules)
            .cancel(&table, fixture.leader())
            .unwrap();
        assert_eq!(outcome.expected, TurnPhase::Decision);
        assert_eq!(outcome.round_state.phase(), TurnPhase::Decision);
    }

    #[test]
    fn test_unknown_character_is_not_found() {
        let (table, _) = Table::new();
        let rules = RulesConfig::default();
        let result = TurnMachine::new(&rules).commit_action(&table, Uuid::new_v4());
        assert!(matches!(result, Err(DomainError::AggregateNotFound(_))));
    }

    #[test]
    fn test_selection_only_in_decision() {
        let (mut table, fixture) = Table::new();
        let id = fixture.leader();
        table.choose(id, SelectionEdit::Approach(Some(Approach::Force)));
        table.run(|m, t| m.commit_action(t, id));

        let rules = table.rules.clone();
        let result = TurnMachine::new(&rules).select(
            &table,
            id,
            SelectionEdit::Effect(Effect::Great),
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_full_success_goes_to_success_resolution() {
        let (mut table, fixture) = Table::new();
        let state = table.act(fixture.leader(), Position::Risky, vec![6, 2]);
        assert_eq!(state.state, TurnState::SuccessResolution { draft: None });
    }

    #[test]
    fn test_zero_pool_rolls_two_and_keeps_lower() {
        let (mut table, fixture) = Table::new();
        let id = fixture.leader();
        table.choose(id, SelectionEdit::Approach(Some(Approach::Spirit)));
        table.run(|m, t| m.commit_action(t, id));
        let state = table.run(|m, t| m.roll(t, id, &mut SequenceRng::new(vec![6, 2])));

        let roll = state.last_roll.as_ref().unwrap();
        assert!(roll.desperate);
        assert_eq!(roll.kept, 2);
        assert_eq!(state.phase(), TurnPhase::AwaitingConsequence);
    }

    #[test]
    fn test_failure_applies_harm_and_momentum_from_original_position() {
        let (mut table, fixture) = Table::new();
        let id = fixture.leader();
        let before = table.momentum(fixture.crew_id);
        table.act(id, Position::Desperate, vec![1, 3]);
        table.draft(
            id,
            DraftEdit::SetKind {
                kind: Some(ConsequenceKind::Harm {
                    target_character_id: id,
                    clock: ClockTarget::New {
                        label: "Broken rib".into(),
                        size: None,
                    },
                }),
            },
        );

        let state = table.run(|m, t| m.accept_consequence(t, id));

        let TurnState::ApplyingEffects { applied } = state.state else {
            panic!("expected ApplyingEffects, got {:?}", state.state);
        };
        assert_eq!(applied.severity, 3);
        assert_eq!(table.clocks.get(applied.clock_id).unwrap().segments, 3);
        assert_eq!(table.momentum(fixture.crew_id), before + 4);
        assert!(!applied.target_dying);
    }

    #[test]
    fn test_partial_with_defensive_success_keeps_draft() {
        let (mut table, fixture) = Table::new();
        let id = fixture.leader();
        let before = table.momentum(fixture.crew_id);
        table.act(id, Position::Risky, vec![4, 2]);
        table.draft(
            id,
            DraftEdit::SetKind {
                kind: Some(ConsequenceKind::Harm {
                    target_character_id: id,
                    clock: ClockTarget::New {
                        label: "Sprain".into(),
                        size: None,
                    },
                }),
            },
        );
        table.draft(id, DraftEdit::SetDefensive { enabled: true });

        let state = table.run(|m, t| m.accept_consequence(t, id));

        let TurnState::SuccessResolution { draft: Some(draft) } = &state.state else {
            panic!("expected SuccessResolution with a draft, got {:?}", state.state);
        };
        assert!(draft.defensive_success);
        let harm = table.clocks.by_owner_and_category(id, ClockCategory::Harm);
        assert_eq!(harm[0].segments, 1);
        assert_eq!(table.momentum(fixture.crew_id), before + 2);
    }

    #[test]
    fn test_partial_without_defensive_success_takes_full_severity() {
        let (mut table, fixture) = Table::new();
        let id = fixture.leader();
        let before = table.momentum(fixture.crew_id);
        table.act(id, Position::Risky, vec![5, 2]);
        table.draft(
            id,
            DraftEdit::SetKind {
                kind: Some(ConsequenceKind::Harm {
                    target_character_id: id,
                    clock: ClockTarget::New {
                        label: "Gashed arm".into(),
                        size: None,
                    },
                }),
            },
        );

        let state = table.run(|m, t| m.accept_consequence(t, id));

        let TurnState::SuccessResolution { draft: Some(draft) } = &state.state else {
            panic!("expected SuccessResolution with a draft, got {:?}", state.state);
        };
        assert!(!draft.defensive_success);
        assert_eq!(state.phase(), TurnPhase::SuccessResolution);
        let harm = table.clocks.by_owner_and_category(id, ClockCategory::Harm);
        assert_eq!(harm.len(), 1);
        assert_eq!(harm[0].segments, 2);
        assert_eq!(table.momentum(fixture.crew_id), before + 2);
    }

    #[test]
    fn test_defensive_success_rejected_on_failure() {
        let (mut table, fixture) = Table::new();
        let id = fixture.leader();
        table.act(id, Position::Risky, vec![1, 2]);
        let rules = table.rules.clone();
        let result = TurnMachine::new(&rules).update_draft(
            &table,
            id,
            DraftEdit::SetDefensive { enabled: true },
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_accept_without_consequence_is_rejected() {
        let (mut table, fixture) = Table::new();
        let id = fixture.leader();
        table.act(id, Position::Risky, vec![1, 2]);
        let rules = table.rules.clone();
        let result = TurnMachine::new(&rules).accept_consequence(&table, id);
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_harm_overflow_fills_clock_and_reports_dying() {
        let (mut table, fixture) = Table::new();
        let id = fixture.leader();
        let wound = NewClock::harm(id, fixture.crew_id, "Gut wound");
        let wound_id = wound.id;
        table.clocks.create(&table.rules.clocks, wound).unwrap();
        table.clocks.add_segments(wound_id, 5).unwrap();

        table.act(id, Position::Desperate, vec![2, 1]);
        table.draft(
            id,
            DraftEdit::SetKind {
                kind: Some(ConsequenceKind::Harm {
                    target_character_id: id,
                    clock: ClockTarget::Existing { clock_id: wound_id },
                }),
            },
        );
        let rules = table.rules.clone();
        let outcome = TurnMachine::new(&rules)
            .accept_consequence(&table, id)
            .unwrap();
        assert_eq!(outcome.dying, vec![id]);
        table.commit(outcome);

        assert_eq!(table.clocks.get(wound_id).unwrap().segments, 6);
        assert!(table.clocks.is_dying(id));
    }

    #[test]
    fn test_consequence_on_frozen_harm_clock_is_rejected() {
        let (mut table, fixture) = Table::new();
        let id = fixture.leader();
        let wound = NewClock::harm(id, fixture.crew_id, "Frostbite");
        let wound_id = wound.id;
        table.clocks.create(&table.rules.clocks, wound).unwrap();
        table.act(id, Position::Risky, vec![1, 2]);
        table.draft(
            id,
            DraftEdit::SetKind {
                kind: Some(ConsequenceKind::Harm {
                    target_character_id: id,
                    clock: ClockTarget::Existing { clock_id: wound_id },
                }),
            },
        );
        table.clocks.set_frozen(wound_id, true).unwrap();

        let rules = table.rules.clone();
        let result = TurnMachine::new(&rules).accept_consequence(&table, id);

        let Err(DomainError::Validation(message)) = result else {
            panic!("expected a validation error, got {result:?}");
        };
        assert!(message.contains("consequence"), "{message}");
        assert_eq!(table.clocks.get(wound_id).unwrap().segments, 0);
    }

    #[test]
    fn test_new_harm_clock_at_cap_lands_on_replaced_clock() {
        let (mut table, fixture) = Table::new();
        let id = fixture.leader();
        for (label, segments) in [("A", 2), ("B", 1), ("C", 3)] {
            let clock = NewClock::harm(id, fixture.crew_id, label);
            let clock_id = clock.id;
            table.clocks.create(&table.rules.clocks, clock).unwrap();
            table.clocks.add_segments(clock_id, segments).unwrap();
        }

        table.act(id, Position::Risky, vec![1, 1]);
        table.draft(
            id,
            DraftEdit::SetKind {
                kind: Some(ConsequenceKind::Harm {
                    target_character_id: id,
                    clock: ClockTarget::New {
                        label: "Concussion".into(),
                        size: None,
                    },
                }),
            },
        );
        table.run(|m, t| m.accept_consequence(t, id));

        let harm = table.clocks.by_owner_and_category(id, ClockCategory::Harm);
        assert_eq!(harm.len(), 3);
        let replaced = harm.iter().find(|c| c.label == "Concussion").unwrap();
        assert_eq!(replaced.segments, 3);
    }

    #[test]
    fn test_stimulant_without_fill_rerolls() {
        let (mut table, fixture) = Table::new();
        let id = fixture.leader();
        table.act(id, Position::Risky, vec![1, 2]);
        table.run(|m, t| m.use_stimulant(t, id));

        let state = table.run(|m, t| m.resolve_stimulant(t, id, &mut SequenceRng::new(vec![3])));

        assert_eq!(state.state, TurnState::Rolling);
        assert_eq!(state.last_stimulant_roll, Some(3));
        let addiction = table.clocks.addiction_clock(fixture.crew_id).unwrap();
        assert_eq!(addiction.segments, 3);

        let state = table.run(|m, t| m.roll(t, id, &mut SequenceRng::new(vec![6, 1])));
        assert_eq!(state.phase(), TurnPhase::SuccessResolution);
    }

    #[test]
    fn test_stimulant_fill_locks_then_returns_to_consequence() {
        let (mut table, fixture) = Table::new();
        let id = fixture.leader();
        let addiction = NewClock::addiction(fixture.crew_id, ADDICTION_CLOCK_LABEL);
        let addiction_id = addiction.id;
        table.clocks.create(&table.rules.clocks, addiction).unwrap();
        table.clocks.add_segments(addiction_id, 6).unwrap();

        table.act(id, Position::Risky, vec![4, 1]);
        table.draft(id, DraftEdit::SetDefensive { enabled: true });
        table.run(|m, t| m.use_stimulant(t, id));
        let state = table.run(|m, t| m.resolve_stimulant(t, id, &mut SequenceRng::new(vec![5])));

        assert_eq!(state.phase(), TurnPhase::StimulantLocked);
        let clock = table.clocks.get(addiction_id).unwrap();
        assert_eq!(clock.segments, 8);
        assert!(clock.frozen);

        let state = table.run(|m, t| m.return_from_lock(t, id));
        let TurnState::AwaitingConsequence { draft } = state.state else {
            panic!("expected AwaitingConsequence");
        };
        assert!(draft.defensive_success);

        let rules = table.rules.clone();
        let again = TurnMachine::new(&rules).use_stimulant(&table, id);
        assert!(matches!(again, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_success_advances_progress_and_reduces_countdown() {
        let (mut table, fixture) = Table::new();
        let id = fixture.leader();
        let crew = fixture.crew_id;
        let plan = NewClock::progress(crew, crew, "Crack the vault", 8, false);
        let threat = NewClock::progress(crew, crew, "Alarm", 6, true);
        let (plan_id, threat_id) = (plan.id, threat.id);
        table.clocks.create(&table.rules.clocks, plan).unwrap();
        table.clocks.create(&table.rules.clocks, threat).unwrap();
        table.clocks.add_segments(threat_id, 4).unwrap();

        table.act(id, Position::Risky, vec![6, 1]);
        table.run(|m, t| m.resolve_success(t, id, SuccessChoice::Clock { clock_id: plan_id }));
        assert_eq!(table.clocks.get(plan_id).unwrap().segments, 2);

        table.run(|m, t| m.begin_turn(t, id));
        table.act(id, Position::Desperate, vec![6, 2]);
        let state =
            table.run(|m, t| m.resolve_success(t, id, SuccessChoice::Clock { clock_id: threat_id }));
        assert_eq!(state.phase(), TurnPhase::Complete);
        assert_eq!(table.clocks.get(threat_id).unwrap().segments, 1);
    }

    #[test]
    fn test_success_skip_changes_nothing() {
        let (mut table, fixture) = Table::new();
        let id = fixture.leader();
        table.act(id, Position::Risky, vec![6, 6]);
        let rules = table.rules.clone();
        let outcome = TurnMachine::new(&rules)
            .resolve_success(&table, id, SuccessChoice::Skip)
            .unwrap();
        assert!(outcome.effects.is_empty());
        assert_eq!(outcome.round_state.phase(), TurnPhase::Complete);
    }

    #[test]
    fn test_push_debits_momentum_and_rejects_when_broke() {
        let (mut table, fixture) = Table::new();
        let id = fixture.leader();
        let before = table.momentum(fixture.crew_id);
        table.choose(id, SelectionEdit::Approach(Some(Approach::Force)));
        table.choose(id, SelectionEdit::Push(Some(PushMode::Dice)));
        let state = table.run(|m, t| m.commit_action(t, id));
        assert_eq!(state.committed.unwrap().pool.total(), 3);
        assert_eq!(table.momentum(fixture.crew_id), before - 1);

        table.roster.crew_mut(fixture.crew_id).unwrap().momentum = 0;
        let other = fixture.member_ids[1];
        table.choose(other, SelectionEdit::Approach(Some(Approach::Force)));
        table.choose(other, SelectionEdit::Push(Some(PushMode::Dice)));
        let rules = table.rules.clone();
        let result = TurnMachine::new(&rules).commit_action(&table, other);
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_flashback_adds_trait() {
        let (mut table, fixture) = Table::new();
        let id = fixture.leader();
        let trait_id = Uuid::new_v4();
        table.choose(id, SelectionEdit::Approach(Some(Approach::Guile)));
        table.choose(
            id,
            SelectionEdit::Trait(Some(TraitDraft::Flashback {
                trait_id,
                name: "Bribed the watch".into(),
            })),
        );
        table.run(|m, t| m.commit_action(t, id));

        let character = table.roster.character(id).unwrap();
        assert!(character.find_trait(trait_id).unwrap().from_flashback);
    }

    #[test]
    fn test_cancel_from_any_phase_discards_drafts() {
        let (mut table, fixture) = Table::new();
        let id = fixture.leader();
        table.act(id, Position::Risky, vec![1, 1]);
        table.draft(id, DraftEdit::SetDefensive { enabled: false });

        let state = table.run(|m, t| m.cancel(t, id));

        assert_eq!(state, PlayerRoundState::new(id));
    }

    #[test]
    fn test_begin_turn_only_from_complete() {
        let (table, fixture) = Table::new();
        let rules = RulesConfig::default();
        let result = TurnMachine::new(&rules).begin_turn(&table, fixture.leader());
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_close_turn_from_applying_effects() {
        let (mut table, fixture) = Table::new();
        let id = fixture.leader();
        table.act(id, Position::Controlled, vec![1, 1]);
        table.draft(
            id,
            DraftEdit::SetKind {
                kind: Some(ConsequenceKind::CrewClock {
                    clock: ClockTarget::New {
                        label: "Patrol closes in".into(),
                        size: Some(4),
                    },
                }),
            },
        );
        table.run(|m, t| m.accept_consequence(t, id));
        let state = table.run(|m, t| m.close_turn(t, id));
        assert_eq!(state.phase(), TurnPhase::Complete);

        let crew_clocks = table
            .clocks
            .by_owner_and_category(fixture.crew_id, ClockCategory::Progress);
        assert_eq!(crew_clocks[0].segments, 1);
        assert!(crew_clocks[0].is_countdown());
    }

    #[test]
    fn test_mock_rng_rolls_failure() {
        let (mut table, fixture) = Table::new();
        let id = fixture.leader();
        table.choose(id, SelectionEdit::Approach(Some(Approach::Force)));
        table.run(|m, t| m.commit_action(t, id));
        let state = table.run(|m, t| m.roll(t, id, &mut MockRng));
        assert_eq!(
            state.last_roll.map(|r| r.outcome),
            Some(RollOutcome::Failure)
        );
    }
}

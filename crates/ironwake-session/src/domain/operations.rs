//! Operations committed by the authority.

use std::collections::HashSet;

use ironwake_character::RosterCommand;
use ironwake_clocks::{ClockCategory, ClockCommand, NewClock};
use ironwake_core::command::Command;
use ironwake_core::config::RulesConfig;
use ironwake_core::error::DomainError;
use ironwake_core::history::AggregateRef;
use ironwake_turn::{PlayerRoundState, TurnEffect, TurnPhase};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::store::GameStore;

/// One mutation inside a commit batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// A state-machine transition; at most one per batch.
    Transition {
        /// The character whose turn moves.
        character_id: Uuid,
        /// Phase the transition was computed from.
        expected: TurnPhase,
        /// Round state after the transition.
        next: Box<PlayerRoundState>,
    },
    /// A round-state edit that keeps the phase.
    EditRoundState {
        /// The character.
        character_id: Uuid,
        /// Edited round state.
        next: Box<PlayerRoundState>,
    },
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

impl From<TurnEffect> for Operation {
    fn from(effect: TurnEffect) -> Self {
        match effect {
            TurnEffect::Clock { command } => Self::Clock { command },
            TurnEffect::Roster { command } => Self::Roster { command },
        }
    }
}

impl Operation {
    /// Whether this is a state-machine transition.
    #[must_use]
    pub fn is_transition(&self) -> bool {
        matches!(self, Self::Transition { .. })
    }

    /// Entity ids whose views must refresh after this operation.
    #[must_use]
    pub fn entity_ids(&self) -> Vec<Uuid> {
        match self {
            Self::Clock {
                command: ClockCommand::Create { clock },
            } => vec![clock.id, clock.owner_id],
            _ => vec![self.aggregate().id],
        }
    }

    /// Check the operation against the pre-batch store.
    ///
    /// Ids the operation creates are added to `created` so later operations
    /// in the same batch may refer to them.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a stale or malformed round-state
    /// change or a clock whose owner or scope does not fit its category,
    /// `DomainError::AggregateNotFound` for an unknown clock owner, and the
    /// wrapped command's error otherwise.
    pub fn validate(
        &self,
        store: &GameStore,
        rules: &RulesConfig,
        created: &mut HashSet<Uuid>,
    ) -> Result<(), DomainError> {
        match self {
            Self::Transition {
                character_id,
                expected,
                next,
            } => {
                require_character(store, created, *character_id, next)?;
                let actual = store.phase_of(*character_id);
                if actual != *expected {
                    return Err(DomainError::Validation(format!(
                        "stale transition for character {character_id}: expected {expected}, found {actual}"
                    )));
                }
                Ok(())
            }
            Self::EditRoundState { character_id, next } => {
                require_character(store, created, *character_id, next)?;
                let actual = store.phase_of(*character_id);
                if actual != next.phase() {
                    return Err(DomainError::Validation(format!(
                        "round-state edit for character {character_id} changes phase {actual} to {}",
                        next.phase()
                    )));
                }
                Ok(())
            }
            Self::Clock { command } => {
                match command {
                    ClockCommand::Create { clock } => check_clock_owner(store, created, clock)?,
                    ClockCommand::ChangeCategory { clock_id, kind, .. } => {
                        if let Some(clock) = store.clocks.get(*clock_id) {
                            owner_scope(store, created, clock.owner_id, kind.category())?;
                        }
                    }
                    _ => {}
                }
                command.validate(&store.clocks, &rules.clocks, created)?;
                if let ClockCommand::Create { clock } = command {
                    let outcome = store.clocks.preview_create(&rules.clocks, clock)?;
                    created.insert(outcome.clock_id());
                }
                Ok(())
            }
            Self::Roster { command } => {
                command.validate(&store.roster, created)?;
                if let Some(id) = command.registered_id() {
                    created.insert(id);
                }
                Ok(())
            }
        }
    }

    /// Apply the operation to `store`.
    ///
    /// # Errors
    ///
    /// Returns the wrapped command's error.
    pub fn apply(&self, store: &mut GameStore, rules: &RulesConfig) -> Result<(), DomainError> {
        match self {
            Self::Transition {
                character_id, next, ..
            }
            | Self::EditRoundState { character_id, next } => {
                store
                    .round_states
                    .insert(*character_id, next.as_ref().clone());
                Ok(())
            }
            Self::Clock { command } => command.apply(&mut store.clocks, &rules.clocks),
            Self::Roster { command } => {
                command.apply(&mut store.roster, &rules.momentum)?;
                if let RosterCommand::AddCrewMember {
                    crew_id,
                    character_id,
                } = command
                {
                    store.clocks.rescope(*character_id, *crew_id);
                }
                Ok(())
            }
        }
    }
}

/// The scope a clock of `category` held by `owner_id` must carry: the
/// character's crew (or the character itself when crewless), or the crew.
///
/// Returns `None` for an owner registered earlier in the same batch, whose
/// crew is not visible in the pre-batch store.
fn owner_scope(
    store: &GameStore,
    created: &HashSet<Uuid>,
    owner_id: Uuid,
    category: ClockCategory,
) -> Result<Option<Uuid>, DomainError> {
    if let Some(character) = store.roster.characters.get(&owner_id) {
        if category == ClockCategory::Addiction {
            return Err(DomainError::Validation(format!(
                "{category} clocks belong to a crew, not character {owner_id}"
            )));
        }
        return Ok(Some(character.crew_id.unwrap_or(owner_id)));
    }
    if store.roster.crews.contains_key(&owner_id) {
        if matches!(category, ClockCategory::Harm | ClockCategory::Consumable) {
            return Err(DomainError::Validation(format!(
                "{category} clocks belong to a character, not crew {owner_id}"
            )));
        }
        return Ok(Some(owner_id));
    }
    if created.contains(&owner_id) {
        return Ok(None);
    }
    Err(DomainError::AggregateNotFound(owner_id))
}

fn check_clock_owner(
    store: &GameStore,
    created: &HashSet<Uuid>,
    clock: &NewClock,
) -> Result<(), DomainError> {
    match owner_scope(store, created, clock.owner_id, clock.kind.category())? {
        Some(scope_id) if scope_id != clock.scope_id => Err(DomainError::Validation(format!(
            "clock for owner {} must be scoped to {scope_id}, not {}",
            clock.owner_id, clock.scope_id
        ))),
        Some(_) => Ok(()),
        None if clock.scope_id == clock.owner_id
            || store.roster.crews.contains_key(&clock.scope_id)
            || created.contains(&clock.scope_id) =>
        {
            Ok(())
        }
        None => Err(DomainError::AggregateNotFound(clock.scope_id)),
    }
}

fn require_character(
    store: &GameStore,
    created: &HashSet<Uuid>,
    character_id: Uuid,
    next: &PlayerRoundState,
) -> Result<(), DomainError> {
    if !store.roster.characters.contains_key(&character_id) && !created.contains(&character_id) {
        return Err(DomainError::AggregateNotFound(character_id));
    }
    if next.character_id != character_id {
        return Err(DomainError::Validation(format!(
            "round state for {} filed under character {character_id}",
            next.character_id
        )));
    }
    Ok(())
}

impl Command for Operation {
    fn command_type(&self) -> &'static str {
        match self {
            Self::Transition { .. } => "turn.transition",
            Self::EditRoundState { .. } => "turn.edit_round_state",
            Self::Clock { command } => command.command_type(),
            Self::Roster { command } => command.command_type(),
        }
    }

    fn aggregate(&self) -> AggregateRef {
        match self {
            Self::Transition { character_id, .. } | Self::EditRoundState { character_id, .. } => {
                AggregateRef::character(*character_id)
            }
            Self::Clock { command } => command.aggregate(),
            Self::Roster { command } => command.aggregate(),
        }
    }

    fn is_structural(&self) -> bool {
        match self {
            Self::Transition { .. } | Self::EditRoundState { .. } => false,
            Self::Clock { command } => command.is_structural(),
            Self::Roster { command } => command.is_structural(),
        }
    }
}

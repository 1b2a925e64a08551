//! Query handlers — read-only views over the game store.

use ironwake_character::{ApproachRatings, Equipment, Trait};
use ironwake_clocks::{Clock, ClockCategory};
use ironwake_core::error::DomainError;
use ironwake_turn::PlayerRoundState;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::store::GameStore;

/// Read-only view of a character.
#[derive(Debug, Serialize)]
pub struct CharacterView {
    /// The character identifier.
    pub character_id: Uuid,
    /// Display name.
    pub name: String,
    /// Crew the character belongs to, if any.
    pub crew_id: Option<Uuid>,
    /// Approach ratings.
    pub approaches: ApproachRatings,
    /// Traits, including flashback traits.
    pub traits: Vec<Trait>,
    /// Carried equipment.
    pub equipment: Vec<Equipment>,
    /// The character's harm clocks.
    pub harm_clocks: Vec<Clock>,
    /// Whether a harm clock is full.
    pub dying: bool,
}

/// Read-only view of a crew.
#[derive(Debug, Serialize)]
pub struct CrewView {
    /// The crew identifier.
    pub crew_id: Uuid,
    /// Display name.
    pub name: String,
    /// Shared momentum.
    pub momentum: u8,
    /// Member character ids.
    pub members: Vec<Uuid>,
    /// Clocks owned by the crew.
    pub clocks: Vec<Clock>,
}

/// Retrieves a character by ID.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the character does not exist.
pub fn get_character_by_id(
    store: &GameStore,
    character_id: Uuid,
) -> Result<CharacterView, DomainError> {
    let character = store.roster.character(character_id)?;
    Ok(CharacterView {
        character_id,
        name: character.name.clone(),
        crew_id: character.crew_id,
        approaches: character.approaches,
        traits: character.traits.clone(),
        equipment: character.equipment.clone(),
        harm_clocks: store
            .clocks
            .by_owner_and_category(character_id, ClockCategory::Harm)
            .into_iter()
            .cloned()
            .collect(),
        dying: store.clocks.is_dying(character_id),
    })
}

/// Retrieves a crew by ID.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the crew does not exist.
pub fn get_crew_by_id(store: &GameStore, crew_id: Uuid) -> Result<CrewView, DomainError> {
    let crew = store.roster.crew(crew_id)?;
    Ok(CrewView {
        crew_id,
        name: crew.name.clone(),
        momentum: crew.momentum,
        members: crew.members.clone(),
        clocks: store.clocks.by_owner(crew_id).into_iter().cloned().collect(),
    })
}

/// Clocks owned by `owner_id`, optionally narrowed to one category.
#[must_use]
pub fn list_clocks(
    store: &GameStore,
    owner_id: Uuid,
    category: Option<ClockCategory>,
) -> Vec<Clock> {
    let clocks = match category {
        Some(category) => store.clocks.by_owner_and_category(owner_id, category),
        None => store.clocks.by_owner(owner_id),
    };
    clocks.into_iter().cloned().collect()
}

/// Round state of a character; a fresh `Decision` state if none exists yet.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the character does not exist.
pub fn get_round_state(
    store: &GameStore,
    character_id: Uuid,
) -> Result<PlayerRoundState, DomainError> {
    store.roster.character(character_id)?;
    Ok(store
        .round_states
        .get(&character_id)
        .cloned()
        .unwrap_or_else(|| PlayerRoundState::new(character_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironwake_clocks::{ClockCommand, NewClock};
    use ironwake_core::config::RulesConfig;
    use ironwake_test_support::CrewFixture;
    use ironwake_turn::TurnPhase;

    fn store() -> (GameStore, CrewFixture) {
        let rules = RulesConfig::default();
        let fixture = CrewFixture::new(2);
        let mut store = GameStore {
            roster: fixture.roster(&rules.momentum),
            ..GameStore::default()
        };
        let harm = NewClock::harm(fixture.leader(), fixture.crew_id, "Broken arm");
        let harm_id = harm.id;
        ClockCommand::Create { clock: harm }
            .apply(&mut store.clocks, &rules.clocks)
            .unwrap();
        ClockCommand::AddSegments {
            clock_id: harm_id,
            amount: rules.clocks.harm_max,
        }
        .apply(&mut store.clocks, &rules.clocks)
        .unwrap();
        ClockCommand::Create {
            clock: NewClock::progress(fixture.crew_id, fixture.crew_id, "Vault", 8, false),
        }
        .apply(&mut store.clocks, &rules.clocks)
        .unwrap();
        (store, fixture)
    }

    #[test]
    fn test_get_character_by_id_reports_dying() {
        // Arrange
        let (store, fixture) = store();

        // Act
        let view = get_character_by_id(&store, fixture.leader()).unwrap();

        // Assert
        assert_eq!(view.name, "Member 1");
        assert_eq!(view.crew_id, Some(fixture.crew_id));
        assert_eq!(view.harm_clocks.len(), 1);
        assert!(view.dying);
    }

    #[test]
    fn test_get_character_by_id_not_found() {
        let (store, _) = store();
        let missing = Uuid::new_v4();

        let result = get_character_by_id(&store, missing);

        assert!(matches!(result, Err(DomainError::AggregateNotFound(id)) if id == missing));
    }

    #[test]
    fn test_get_crew_by_id_lists_members_and_clocks() {
        let (store, fixture) = store();

        let view = get_crew_by_id(&store, fixture.crew_id).unwrap();

        assert_eq!(view.members, fixture.member_ids);
        assert_eq!(view.momentum, RulesConfig::default().momentum.starting);
        assert_eq!(view.clocks.len(), 1);
    }

    #[test]
    fn test_list_clocks_filters_by_category() {
        let (store, fixture) = store();

        assert_eq!(list_clocks(&store, fixture.leader(), None).len(), 1);
        assert!(
            list_clocks(&store, fixture.leader(), Some(ClockCategory::Progress)).is_empty()
        );
    }

    #[test]
    fn test_get_round_state_defaults_to_decision() {
        let (store, fixture) = store();

        let state = get_round_state(&store, fixture.member_ids[1]).unwrap();

        assert_eq!(state.phase(), TurnPhase::Decision);
    }
}

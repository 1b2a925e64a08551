//! Every character and crew of a game.

use std::collections::BTreeMap;

use ironwake_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregates::{Character, Crew};

/// Characters and crews keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    /// Characters by id.
    pub characters: BTreeMap<Uuid, Character>,
    /// Crews by id.
    pub crews: BTreeMap<Uuid, Crew>,
}

impl Roster {
    /// Look up a character.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for an unknown id.
    pub fn character(&self, character_id: Uuid) -> Result<&Character, DomainError> {
        self.characters
            .get(&character_id)
            .ok_or(DomainError::AggregateNotFound(character_id))
    }

    /// Look up a character for mutation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for an unknown id.
    pub fn character_mut(&mut self, character_id: Uuid) -> Result<&mut Character, DomainError> {
        self.characters
            .get_mut(&character_id)
            .ok_or(DomainError::AggregateNotFound(character_id))
    }

    /// Look up a crew.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for an unknown id.
    pub fn crew(&self, crew_id: Uuid) -> Result<&Crew, DomainError> {
        self.crews
            .get(&crew_id)
            .ok_or(DomainError::AggregateNotFound(crew_id))
    }

    /// Look up a crew for mutation.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for an unknown id.
    pub fn crew_mut(&mut self, crew_id: Uuid) -> Result<&mut Crew, DomainError> {
        self.crews
            .get_mut(&crew_id)
            .ok_or(DomainError::AggregateNotFound(crew_id))
    }

    /// The crew a character belongs to.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for an unknown character and
    /// `DomainError::Validation` if the character has no crew.
    pub fn crew_of(&self, character_id: Uuid) -> Result<&Crew, DomainError> {
        let character = self.character(character_id)?;
        let crew_id = character.crew_id.ok_or_else(|| {
            DomainError::Validation(format!("character {character_id} is not in a crew"))
        })?;
        self.crew(crew_id)
    }

    /// Add `character_id` to `crew_id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for unknown ids and
    /// `DomainError::Validation` if the character already belongs to a crew.
    pub fn join_crew(&mut self, crew_id: Uuid, character_id: Uuid) -> Result<(), DomainError> {
        self.crew(crew_id)?;
        let character = self.character_mut(character_id)?;
        if let Some(existing) = character.crew_id {
            return Err(DomainError::Validation(format!(
                "character {character_id} already belongs to crew {existing}"
            )));
        }
        character.crew_id = Some(crew_id);
        self.crew_mut(crew_id)?.members.push(character_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::ApproachRatings;

    fn roster_with(character_id: Uuid, crew_id: Uuid) -> Roster {
        let mut roster = Roster::default();
        roster.characters.insert(
            character_id,
            Character::new(character_id, "Ilse", ApproachRatings::default()),
        );
        roster
            .crews
            .insert(crew_id, Crew::new(crew_id, "Lanternjaws", 2));
        roster
    }

    #[test]
    fn test_join_crew_links_both_sides() {
        let (character_id, crew_id) = (Uuid::new_v4(), Uuid::new_v4());
        let mut roster = roster_with(character_id, crew_id);

        roster.join_crew(crew_id, character_id).unwrap();

        assert_eq!(roster.crew_of(character_id).unwrap().id, crew_id);
        assert!(roster.crew(crew_id).unwrap().has_member(character_id));
    }

    #[test]
    fn test_character_cannot_join_two_crews() {
        let (character_id, crew_id) = (Uuid::new_v4(), Uuid::new_v4());
        let mut roster = roster_with(character_id, crew_id);
        let other = Uuid::new_v4();
        roster.crews.insert(other, Crew::new(other, "Saltmarch", 0));

        roster.join_crew(crew_id, character_id).unwrap();
        assert!(matches!(
            roster.join_crew(other, character_id),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_crew_of_without_crew_is_validation_error() {
        let (character_id, crew_id) = (Uuid::new_v4(), Uuid::new_v4());
        let roster = roster_with(character_id, crew_id);
        assert!(matches!(
            roster.crew_of(character_id),
            Err(DomainError::Validation(_))
        ));
    }
}

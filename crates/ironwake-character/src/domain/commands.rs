//! Commands that mutate the roster.

use std::collections::HashSet;

use ironwake_core::command::Command;
use ironwake_core::config::MomentumRules;
use ironwake_core::error::DomainError;
use ironwake_core::history::AggregateRef;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::aggregates::{Approach, ApproachRatings, Character, Crew, Equipment, Trait};
use super::roster::Roster;

/// A single roster mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RosterCommand {
    /// Register a new character, optionally joining a crew.
    RegisterCharacter {
        /// Identifier for the character.
        character_id: Uuid,
        /// Display name.
        name: String,
        /// Crew to join.
        #[serde(default)]
        crew_id: Option<Uuid>,
        /// Starting ratings.
        #[serde(default)]
        approaches: ApproachRatings,
    },
    /// Register a new crew with the starting momentum.
    RegisterCrew {
        /// Identifier for the crew.
        crew_id: Uuid,
        /// Display name.
        name: String,
    },
    /// Add an existing character to a crew.
    AddCrewMember {
        /// The crew.
        crew_id: Uuid,
        /// The character.
        character_id: Uuid,
    },
    /// Change one approach rating.
    SetApproachRating {
        /// The character.
        character_id: Uuid,
        /// Which approach.
        approach: Approach,
        /// New rating.
        rating: u8,
    },
    /// Give a character a trait.
    AddTrait {
        /// The character.
        character_id: Uuid,
        /// The trait.
        #[serde(rename = "trait")]
        new_trait: Trait,
    },
    /// Give a character an item.
    AddEquipment {
        /// The character.
        character_id: Uuid,
        /// The item.
        item: Equipment,
    },
    /// Equip or unequip an item.
    SetEquipped {
        /// The character.
        character_id: Uuid,
        /// The item.
        item_id: Uuid,
        /// New equipped flag.
        equipped: bool,
    },
    /// Gain (positive) or spend (negative) crew momentum.
    AdjustMomentum {
        /// The crew.
        crew_id: Uuid,
        /// Signed change; gains are capped, overspending is rejected.
        delta: i16,
    },
}

impl RosterCommand {
    /// The id registered by this command, if it registers one.
    #[must_use]
    pub fn registered_id(&self) -> Option<Uuid> {
        match self {
            Self::RegisterCharacter { character_id, .. } => Some(*character_id),
            Self::RegisterCrew { crew_id, .. } => Some(*crew_id),
            _ => None,
        }
    }

    /// Check the command against a snapshot taken before its batch started.
    ///
    /// `created` holds ids registered earlier in the same batch; they count as
    /// existing. Checks that depend on earlier operations (momentum balance,
    /// duplicate trait ids) are left to [`RosterCommand::apply`].
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for unknown targets and
    /// `DomainError::Validation` for malformed arguments.
    pub fn validate(&self, roster: &Roster, created: &HashSet<Uuid>) -> Result<(), DomainError> {
        let exists = |id: Uuid, known: bool| {
            if known || created.contains(&id) {
                Ok(())
            } else {
                Err(DomainError::AggregateNotFound(id))
            }
        };
        let character = |id: Uuid| exists(id, roster.characters.contains_key(&id));
        let crew = |id: Uuid| exists(id, roster.crews.contains_key(&id));

        match self {
            Self::RegisterCharacter {
                character_id,
                name,
                crew_id,
                approaches,
            } => {
                require_name(name, "character")?;
                approaches.validate()?;
                if roster.characters.contains_key(character_id) || created.contains(character_id)
                {
                    return Err(DomainError::Validation(format!(
                        "character {character_id} already exists"
                    )));
                }
                crew_id.map_or(Ok(()), crew)
            }
            Self::RegisterCrew { crew_id, name } => {
                require_name(name, "crew")?;
                if roster.crews.contains_key(crew_id) || created.contains(crew_id) {
                    return Err(DomainError::Validation(format!(
                        "crew {crew_id} already exists"
                    )));
                }
                Ok(())
            }
            Self::AddCrewMember {
                crew_id,
                character_id,
            } => {
                crew(*crew_id)?;
                character(*character_id)
            }
            Self::SetApproachRating {
                character_id,
                approach,
                rating,
            } => {
                ApproachRatings::default().set(*approach, *rating)?;
                character(*character_id)
            }
            Self::AddTrait {
                character_id,
                new_trait,
            } => {
                require_name(&new_trait.name, "trait")?;
                character(*character_id)
            }
            Self::AddEquipment { character_id, item } => {
                require_name(&item.name, "item")?;
                character(*character_id)
            }
            Self::SetEquipped { character_id, .. } => character(*character_id),
            Self::AdjustMomentum { crew_id, .. } => crew(*crew_id),
        }
    }

    /// Apply the command to `roster`.
    ///
    /// # Errors
    ///
    /// Returns the aggregate's error for the operation.
    pub fn apply(&self, roster: &mut Roster, rules: &MomentumRules) -> Result<(), DomainError> {
        match self {
            Self::RegisterCharacter {
                character_id,
                name,
                crew_id,
                approaches,
            } => {
                approaches.validate()?;
                roster.characters.insert(
                    *character_id,
                    Character::new(*character_id, name.clone(), *approaches),
                );
                if let Some(crew_id) = crew_id {
                    roster.join_crew(*crew_id, *character_id)?;
                }
                Ok(())
            }
            Self::RegisterCrew { crew_id, name } => {
                roster
                    .crews
                    .insert(*crew_id, Crew::new(*crew_id, name.clone(), rules.starting));
                Ok(())
            }
            Self::AddCrewMember {
                crew_id,
                character_id,
            } => roster.join_crew(*crew_id, *character_id),
            Self::SetApproachRating {
                character_id,
                approach,
                rating,
            } => roster
                .character_mut(*character_id)?
                .approaches
                .set(*approach, *rating),
            Self::AddTrait {
                character_id,
                new_trait,
            } => roster
                .character_mut(*character_id)?
                .add_trait(new_trait.clone()),
            Self::AddEquipment { character_id, item } => {
                roster.character_mut(*character_id)?.add_equipment(item.clone())
            }
            Self::SetEquipped {
                character_id,
                item_id,
                equipped,
            } => roster
                .character_mut(*character_id)?
                .set_equipped(*item_id, *equipped),
            Self::AdjustMomentum { crew_id, delta } => {
                let crew = roster.crew_mut(*crew_id)?;
                let magnitude = u8::try_from(delta.unsigned_abs()).unwrap_or(u8::MAX);
                if *delta >= 0 {
                    crew.gain_momentum(magnitude, rules.max);
                } else {
                    crew.spend_momentum(magnitude)?;
                }
                debug!(%crew_id, delta, momentum = crew.momentum, "momentum adjusted");
                Ok(())
            }
        }
    }
}

fn require_name(name: &str, what: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::Validation(format!(
            "{what} name must not be empty"
        )));
    }
    Ok(())
}

impl Command for RosterCommand {
    fn command_type(&self) -> &'static str {
        match self {
            Self::RegisterCharacter { .. } => "roster.register_character",
            Self::RegisterCrew { .. } => "roster.register_crew",
            Self::AddCrewMember { .. } => "roster.add_crew_member",
            Self::SetApproachRating { .. } => "roster.set_approach_rating",
            Self::AddTrait { .. } => "roster.add_trait",
            Self::AddEquipment { .. } => "roster.add_equipment",
            Self::SetEquipped { .. } => "roster.set_equipped",
            Self::AdjustMomentum { .. } => "roster.adjust_momentum",
        }
    }

    fn aggregate(&self) -> AggregateRef {
        match self {
            Self::RegisterCharacter { character_id, .. }
            | Self::SetApproachRating { character_id, .. }
            | Self::AddTrait { character_id, .. }
            | Self::AddEquipment { character_id, .. }
            | Self::SetEquipped { character_id, .. } => AggregateRef::character(*character_id),
            Self::RegisterCrew { crew_id, .. }
            | Self::AddCrewMember { crew_id, .. }
            | Self::AdjustMomentum { crew_id, .. } => AggregateRef::crew(*crew_id),
        }
    }

    fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::RegisterCharacter { .. }
                | Self::RegisterCrew { .. }
                | Self::AddCrewMember { .. }
                | Self::AddTrait { .. }
                | Self::AddEquipment { .. }
        )
    }
}

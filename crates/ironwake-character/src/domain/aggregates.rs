//! Aggregate roots for characters and crews.

use ironwake_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Highest rating an approach may have.
pub const MAX_APPROACH_RATING: u8 = 4;

/// The four ways a character can go about an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approach {
    /// Direct, physical pressure.
    Force,
    /// Deception and misdirection.
    Guile,
    /// Precision and study.
    Focus,
    /// Will, presence and faith.
    Spirit,
}

impl std::fmt::Display for Approach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Force => write!(f, "force"),
            Self::Guile => write!(f, "guile"),
            Self::Focus => write!(f, "focus"),
            Self::Spirit => write!(f, "spirit"),
        }
    }
}

/// Ratings for every approach, each within `0..=MAX_APPROACH_RATING`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproachRatings {
    /// Force rating.
    pub force: u8,
    /// Guile rating.
    pub guile: u8,
    /// Focus rating.
    pub focus: u8,
    /// Spirit rating.
    pub spirit: u8,
}

impl ApproachRatings {
    /// Rating for `approach`.
    #[must_use]
    pub fn get(&self, approach: Approach) -> u8 {
        match approach {
            Approach::Force => self.force,
            Approach::Guile => self.guile,
            Approach::Focus => self.focus,
            Approach::Spirit => self.spirit,
        }
    }

    /// Set the rating for `approach`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `rating` exceeds the maximum.
    pub fn set(&mut self, approach: Approach, rating: u8) -> Result<(), DomainError> {
        check_rating(approach, rating)?;
        let slot = match approach {
            Approach::Force => &mut self.force,
            Approach::Guile => &mut self.guile,
            Approach::Focus => &mut self.focus,
            Approach::Spirit => &mut self.spirit,
        };
        *slot = rating;
        Ok(())
    }

    /// Check every rating.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` naming the first rating out of range.
    pub fn validate(&self) -> Result<(), DomainError> {
        for approach in [
            Approach::Force,
            Approach::Guile,
            Approach::Focus,
            Approach::Spirit,
        ] {
            check_rating(approach, self.get(approach))?;
        }
        Ok(())
    }
}

fn check_rating(approach: Approach, rating: u8) -> Result<(), DomainError> {
    if rating > MAX_APPROACH_RATING {
        return Err(DomainError::Validation(format!(
            "{approach} rating {rating} exceeds the maximum of {MAX_APPROACH_RATING}"
        )));
    }
    Ok(())
}

/// A character trait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trait {
    /// Trait identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Whether the trait was established through a flashback.
    #[serde(default)]
    pub from_flashback: bool,
}

/// Passive step modifiers from equipment. Positive values improve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierSteps {
    /// Dice added to (or removed from) the pool.
    pub dice: i8,
    /// Position ladder steps.
    pub position: i8,
    /// Effect ladder steps.
    pub effect: i8,
}

impl ModifierSteps {
    fn saturating_add(self, other: Self) -> Self {
        Self {
            dice: self.dice.saturating_add(other.dice),
            position: self.position.saturating_add(other.position),
            effect: self.effect.saturating_add(other.effect),
        }
    }
}

/// An item a character carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    /// Item identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Only equipped items contribute bonuses and modifiers.
    pub equipped: bool,
    /// Dice granted when the item is used as the secondary source.
    pub bonus_dice: u8,
    /// Passive modifiers while equipped.
    #[serde(default)]
    pub modifiers: ModifierSteps,
}

/// The aggregate root for a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// The crew this character belongs to, if any.
    pub crew_id: Option<Uuid>,
    /// Approach ratings.
    pub approaches: ApproachRatings,
    /// Traits, in the order they were gained.
    pub traits: Vec<Trait>,
    /// Carried equipment.
    pub equipment: Vec<Equipment>,
}

impl Character {
    /// Creates a new character with no traits or equipment.
    #[must_use]
    pub fn new(id: Uuid, name: impl Into<String>, approaches: ApproachRatings) -> Self {
        Self {
            id,
            name: name.into(),
            crew_id: None,
            approaches,
            traits: Vec::new(),
            equipment: Vec::new(),
        }
    }

    /// Look up a trait.
    #[must_use]
    pub fn find_trait(&self, trait_id: Uuid) -> Option<&Trait> {
        self.traits.iter().find(|t| t.id == trait_id)
    }

    /// Look up an item.
    #[must_use]
    pub fn find_equipment(&self, item_id: Uuid) -> Option<&Equipment> {
        self.equipment.iter().find(|e| e.id == item_id)
    }

    /// Sum of the modifiers of every equipped item.
    #[must_use]
    pub fn equipped_modifiers(&self) -> ModifierSteps {
        self.equipment
            .iter()
            .filter(|e| e.equipped)
            .fold(ModifierSteps::default(), |acc, e| acc.saturating_add(e.modifiers))
    }

    /// Adds a trait.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the name is empty or the id is
    /// already used.
    pub fn add_trait(&mut self, new_trait: Trait) -> Result<(), DomainError> {
        if new_trait.name.trim().is_empty() {
            return Err(DomainError::Validation(
                "trait name must not be empty".into(),
            ));
        }
        if self.find_trait(new_trait.id).is_some() {
            return Err(DomainError::Validation(format!(
                "trait {} already exists on character {}",
                new_trait.id, self.id
            )));
        }
        self.traits.push(new_trait);
        Ok(())
    }

    /// Adds an item.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the name is empty or the id is
    /// already used.
    pub fn add_equipment(&mut self, item: Equipment) -> Result<(), DomainError> {
        if item.name.trim().is_empty() {
            return Err(DomainError::Validation("item name must not be empty".into()));
        }
        if self.find_equipment(item.id).is_some() {
            return Err(DomainError::Validation(format!(
                "item {} already exists on character {}",
                item.id, self.id
            )));
        }
        self.equipment.push(item);
        Ok(())
    }

    /// Equips or unequips an item.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the item is not carried.
    pub fn set_equipped(&mut self, item_id: Uuid, equipped: bool) -> Result<(), DomainError> {
        let character_id = self.id;
        let item = self
            .equipment
            .iter_mut()
            .find(|e| e.id == item_id)
            .ok_or_else(|| {
                DomainError::Validation(format!(
                    "character {character_id} does not carry item {item_id}"
                ))
            })?;
        item.equipped = equipped;
        Ok(())
    }
}

/// The aggregate root for a crew.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crew {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Shared momentum pool.
    pub momentum: u8,
    /// Member character ids, in joining order.
    pub members: Vec<Uuid>,
}

impl Crew {
    /// Creates a crew with no members.
    #[must_use]
    pub fn new(id: Uuid, name: impl Into<String>, momentum: u8) -> Self {
        Self {
            id,
            name: name.into(),
            momentum,
            members: Vec::new(),
        }
    }

    /// Adds momentum, capped at `max`. Returns the amount actually gained.
    pub fn gain_momentum(&mut self, amount: u8, max: u8) -> u8 {
        let before = self.momentum;
        self.momentum = self.momentum.saturating_add(amount).min(max);
        self.momentum.saturating_sub(before)
    }

    /// Spends momentum.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the crew has less than `amount`.
    pub fn spend_momentum(&mut self, amount: u8) -> Result<(), DomainError> {
        if amount > self.momentum {
            return Err(DomainError::Validation(format!(
                "crew {} has {} momentum, {amount} required",
                self.id, self.momentum
            )));
        }
        self.momentum -= amount;
        Ok(())
    }

    /// Whether `character_id` is a member.
    #[must_use]
    pub fn has_member(&self, character_id: Uuid) -> bool {
        self.members.contains(&character_id)
    }
}

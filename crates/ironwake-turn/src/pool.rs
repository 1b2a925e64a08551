//! Turning a selection into a committed action.

use ironwake_character::{Character, Trait};
use ironwake_core::config::MomentumRules;
use ironwake_core::error::DomainError;
use ironwake_rules::{Ladder, PoolComponents};

use crate::state::{ActionSelection, CommittedAction, PushMode, SecondarySource, TraitDraft};

/// A committed action plus what committing it costs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionAssembly {
    /// The action.
    pub action: CommittedAction,
    /// Momentum owed for push and flashback.
    pub momentum_cost: u8,
    /// Trait to add for a flashback.
    pub flashback_trait: Option<Trait>,
}

/// Build the committed action for `selection`.
///
/// Equipment modifiers of every equipped item adjust the pool, the position
/// and the effect. A push buys either a die or a step of effect.
///
/// # Errors
///
/// Returns `DomainError::Validation` if no approach is selected, the synergy
/// approach repeats the primary one, the equipment source is not carried and
/// equipped, or a used trait is unknown.
pub fn assemble_action(
    character: &Character,
    selection: &ActionSelection,
    momentum: &MomentumRules,
) -> Result<ActionAssembly, DomainError> {
    let approach = selection
        .approach
        .ok_or_else(|| DomainError::Validation("no approach selected".into()))?;

    let secondary = match selection.secondary {
        None => 0,
        Some(SecondarySource::Synergy { approach: assist }) => {
            if assist == approach {
                return Err(DomainError::Validation(format!(
                    "synergy approach must differ from the primary approach {approach}"
                )));
            }
            character.approaches.get(assist)
        }
        Some(SecondarySource::Equipment { item_id }) => {
            let item = character
                .find_equipment(item_id)
                .filter(|item| item.equipped)
                .ok_or_else(|| {
                    DomainError::Validation(format!(
                        "item {item_id} is not equipped by character {}",
                        character.id
                    ))
                })?;
            item.bonus_dice
        }
    };

    let mut momentum_cost = 0u8;
    let mut trait_bonus = 0;
    let mut flashback = 0;
    let mut flashback_trait = None;
    match &selection.trait_draft {
        None => {}
        Some(TraitDraft::Use { trait_id }) => {
            if character.find_trait(*trait_id).is_none() {
                return Err(DomainError::Validation(format!(
                    "character {} has no trait {trait_id}",
                    character.id
                )));
            }
            trait_bonus = 1;
        }
        Some(TraitDraft::Flashback { trait_id, name }) => {
            if name.trim().is_empty() {
                return Err(DomainError::Validation(
                    "trait name must not be empty".into(),
                ));
            }
            flashback = 1;
            momentum_cost = momentum_cost.saturating_add(momentum.flashback_cost);
            flashback_trait = Some(Trait {
                id: *trait_id,
                name: name.clone(),
                from_flashback: true,
            });
        }
    }

    let modifiers = character.equipped_modifiers();
    let mut effect = selection.effect.adjusted(modifiers.effect);
    let mut push = 0;
    match selection.push {
        None => {}
        Some(PushMode::Dice) => push = 1,
        Some(PushMode::Effect) => effect = effect.improved(1),
    }
    if selection.push.is_some() {
        momentum_cost = momentum_cost.saturating_add(momentum.push_cost);
    }

    let pool = PoolComponents {
        approach: character.approaches.get(approach),
        secondary,
        trait_bonus,
        push,
        flashback,
        equipment: modifiers.dice,
    };

    Ok(ActionAssembly {
        action: CommittedAction {
            approach,
            pool,
            position: selection.position.adjusted(modifiers.position),
            effect,
            momentum_spent: momentum_cost,
        },
        momentum_cost,
        flashback_trait,
    })
}

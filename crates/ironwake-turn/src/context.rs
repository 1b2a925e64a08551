//! Read access the machine needs from the shared store.

use ironwake_character::Roster;
use ironwake_clocks::ClockEngine;
use uuid::Uuid;

use crate::state::PlayerRoundState;

/// A read-only view of the shared store.
pub trait TurnContext {
    /// Characters and crews.
    fn roster(&self) -> &Roster;

    /// Clocks.
    fn clocks(&self) -> &ClockEngine;

    /// Round state of `character_id`, if one has been created.
    fn round_state(&self, character_id: Uuid) -> Option<&PlayerRoundState>;
}

//! The shared game store.

use std::collections::BTreeMap;

use ironwake_character::Roster;
use ironwake_clocks::ClockEngine;
use ironwake_turn::{PlayerRoundState, TurnContext, TurnPhase};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything peers replicate: roster, clocks and round states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStore {
    /// Characters and crews.
    pub roster: Roster,
    /// Clocks.
    pub clocks: ClockEngine,
    /// Round state per character, created lazily.
    pub round_states: BTreeMap<Uuid, PlayerRoundState>,
    /// Bumped once per committed batch.
    pub version: u64,
}

impl GameStore {
    /// Current phase of `character_id`; `Decision` if no round state exists.
    #[must_use]
    pub fn phase_of(&self, character_id: Uuid) -> TurnPhase {
        self.round_states
            .get(&character_id)
            .map_or(TurnPhase::Decision, PlayerRoundState::phase)
    }
}

impl TurnContext for GameStore {
    fn roster(&self) -> &Roster {
        &self.roster
    }

    fn clocks(&self) -> &ClockEngine {
        &self.clocks
    }

    fn round_state(&self, character_id: Uuid) -> Option<&PlayerRoundState> {
        self.round_states.get(&character_id)
    }
}

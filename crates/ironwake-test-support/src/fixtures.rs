//! Roster fixtures.

use ironwake_character::{ApproachRatings, Roster, RosterCommand};
use ironwake_core::config::MomentumRules;
use uuid::Uuid;

/// Ratings every fixture character starts with: force 2, guile 1, focus 1,
/// spirit 0.
#[must_use]
pub fn default_ratings() -> ApproachRatings {
    ApproachRatings {
        force: 2,
        guile: 1,
        focus: 1,
        spirit: 0,
    }
}

/// A crew with a fixed number of members, all with [`default_ratings`].
#[derive(Debug, Clone)]
pub struct CrewFixture {
    /// The crew.
    pub crew_id: Uuid,
    /// Members, in registration order.
    pub member_ids: Vec<Uuid>,
}

impl CrewFixture {
    /// A crew with `member_count` members and fresh ids.
    #[must_use]
    pub fn new(member_count: usize) -> Self {
        Self {
            crew_id: Uuid::new_v4(),
            member_ids: (0..member_count).map(|_| Uuid::new_v4()).collect(),
        }
    }

    /// The first member.
    ///
    /// # Panics
    ///
    /// Panics if the fixture has no members.
    #[must_use]
    pub fn leader(&self) -> Uuid {
        self.member_ids[0]
    }

    /// Roster commands that register the crew and its members.
    #[must_use]
    pub fn commands(&self) -> Vec<RosterCommand> {
        let mut commands = vec![RosterCommand::RegisterCrew {
            crew_id: self.crew_id,
            name: "Lanternjaws".into(),
        }];
        commands.extend(
            self.member_ids
                .iter()
                .enumerate()
                .map(|(i, id)| RosterCommand::RegisterCharacter {
                    character_id: *id,
                    name: format!("Member {}", i + 1),
                    crew_id: Some(self.crew_id),
                    approaches: default_ratings(),
                }),
        );
        commands
    }

    /// A roster holding the crew and its members.
    ///
    /// # Panics
    ///
    /// Panics if a fixture command fails to apply.
    #[must_use]
    pub fn roster(&self, momentum: &MomentumRules) -> Roster {
        let mut roster = Roster::default();
        for command in self.commands() {
            command
                .apply(&mut roster, momentum)
                .expect("fixture roster command failed");
        }
        roster
    }
}

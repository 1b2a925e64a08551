//! Mutations of the clock engine.

use std::collections::HashSet;

use ironwake_core::command::Command;
use ironwake_core::config::ClockRules;
use ironwake_core::error::DomainError;
use ironwake_core::history::AggregateRef;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregates::{ClockKind, NewClock};
use super::engine::ClockEngine;

/// A single clock mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClockCommand {
    /// Create a clock (or replace a harm clock at the cap).
    Create {
        /// The clock to create.
        clock: NewClock,
    },
    /// Add segments.
    AddSegments {
        /// Target clock.
        clock_id: Uuid,
        /// Segments to add.
        amount: u8,
    },
    /// Remove segments, flooring at zero.
    ClearSegments {
        /// Target clock.
        clock_id: Uuid,
        /// Segments to remove.
        amount: u8,
    },
    /// Change the label.
    Rename {
        /// Target clock.
        clock_id: Uuid,
        /// New label.
        label: String,
    },
    /// Move to another category.
    ChangeCategory {
        /// Target clock.
        clock_id: Uuid,
        /// New category and metadata.
        kind: ClockKind,
        /// New size for progress clocks.
        #[serde(default)]
        size: Option<u8>,
    },
    /// Freeze or unfreeze.
    SetFrozen {
        /// Target clock.
        clock_id: Uuid,
        /// New frozen flag.
        frozen: bool,
    },
    /// Remove the clock.
    Delete {
        /// Target clock.
        clock_id: Uuid,
    },
}

impl ClockCommand {
    /// The clock this command targets. For `Create` this is the requested id,
    /// which a harm replacement does not use.
    #[must_use]
    pub fn clock_id(&self) -> Uuid {
        match self {
            Self::Create { clock } => clock.id,
            Self::AddSegments { clock_id, .. }
            | Self::ClearSegments { clock_id, .. }
            | Self::Rename { clock_id, .. }
            | Self::ChangeCategory { clock_id, .. }
            | Self::SetFrozen { clock_id, .. }
            | Self::Delete { clock_id } => *clock_id,
        }
    }

    /// Check the command against a snapshot taken before its batch started.
    ///
    /// `created` holds ids created earlier in the same batch; they count as
    /// existing. Range checks that depend on earlier operations in the batch
    /// are left to [`ClockCommand::apply`].
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for a target that neither
    /// exists nor was created earlier in the batch, and whatever
    /// [`ClockEngine::preview_create`] returns for a create.
    pub fn validate(
        &self,
        engine: &ClockEngine,
        rules: &ClockRules,
        created: &HashSet<Uuid>,
    ) -> Result<(), DomainError> {
        match self {
            Self::Create { clock } => {
                if created.contains(&clock.id) {
                    return Err(DomainError::Validation(format!(
                        "clock {} is created twice in one batch",
                        clock.id
                    )));
                }
                engine.preview_create(rules, clock).map(|_| ())
            }
            Self::Rename { label, .. } if label.trim().is_empty() => Err(DomainError::Validation(
                "clock label must not be empty".to_owned(),
            )),
            other => {
                let id = other.clock_id();
                if engine.get(id).is_some() || created.contains(&id) {
                    Ok(())
                } else {
                    Err(DomainError::AggregateNotFound(id))
                }
            }
        }
    }

    /// Apply the command to `engine`.
    ///
    /// # Errors
    ///
    /// Propagates the engine's error for the operation.
    pub fn apply(&self, engine: &mut ClockEngine, rules: &ClockRules) -> Result<(), DomainError> {
        match self {
            Self::Create { clock } => engine.create(rules, clock.clone()).map(|_| ()),
            Self::AddSegments { clock_id, amount } => {
                engine.add_segments(*clock_id, *amount).map(|_| ())
            }
            Self::ClearSegments { clock_id, amount } => {
                engine.clear_segments(*clock_id, *amount).map(|_| ())
            }
            Self::Rename { clock_id, label } => engine.rename(*clock_id, label),
            Self::ChangeCategory {
                clock_id,
                kind,
                size,
            } => engine.change_category(rules, *clock_id, *kind, *size),
            Self::SetFrozen { clock_id, frozen } => engine.set_frozen(*clock_id, *frozen),
            Self::Delete { clock_id } => engine.delete(*clock_id).map(|_| ()),
        }
    }
}

impl Command for ClockCommand {
    fn command_type(&self) -> &'static str {
        match self {
            Self::Create { .. } => "clock.create",
            Self::AddSegments { .. } => "clock.add_segments",
            Self::ClearSegments { .. } => "clock.clear_segments",
            Self::Rename { .. } => "clock.rename",
            Self::ChangeCategory { .. } => "clock.change_category",
            Self::SetFrozen { .. } => "clock.set_frozen",
            Self::Delete { .. } => "clock.delete",
        }
    }

    fn aggregate(&self) -> AggregateRef {
        AggregateRef::clock(self.clock_id())
    }

    fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::Create { .. } | Self::Delete { .. } | Self::ChangeCategory { .. }
        )
    }
}

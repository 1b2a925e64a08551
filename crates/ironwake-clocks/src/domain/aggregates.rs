//! Clock value types.

use ironwake_core::config::ClockRules;
use ironwake_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Index category of a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockCategory {
    /// Per-character injury.
    Harm,
    /// Shared-supply stock.
    Consumable,
    /// Per-crew overuse of stimulants.
    Addiction,
    /// Freeform progress or threat tracker.
    Progress,
}

impl std::fmt::Display for ClockCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Harm => write!(f, "harm"),
            Self::Consumable => write!(f, "consumable"),
            Self::Addiction => write!(f, "addiction"),
            Self::Progress => write!(f, "progress"),
        }
    }
}

/// Rarity tier of a consumable; decides the clock size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    /// Largest stock.
    Common,
    /// Medium stock.
    Uncommon,
    /// Smallest stock.
    Rare,
}

/// How easy a consumable is to come by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Exhausted; must be restocked.
    Depleted,
    /// Hard to find.
    Scarce,
    /// Normal availability.
    Available,
    /// Plentiful.
    Abundant,
}

impl Availability {
    /// One tier lower, bottoming out at `Depleted`.
    #[must_use]
    pub fn downgraded(self) -> Self {
        match self {
            Self::Abundant => Self::Available,
            Self::Available => Self::Scarce,
            Self::Scarce | Self::Depleted => Self::Depleted,
        }
    }
}

/// Category plus the metadata that only makes sense for that category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum ClockKind {
    /// Harm clock; size fixed by configuration.
    Harm,
    /// Consumable clock; size derived from rarity.
    Consumable {
        /// Rarity tier.
        rarity: Rarity,
        /// Availability tier; downgraded when the clock fills.
        availability: Availability,
    },
    /// Addiction clock; one per owner.
    Addiction,
    /// Progress clock; size from the allowed set.
    Progress {
        /// Whether advancing the clock is bad news.
        countdown: bool,
    },
}

impl ClockKind {
    /// The index category of this kind.
    #[must_use]
    pub fn category(&self) -> ClockCategory {
        match self {
            Self::Harm => ClockCategory::Harm,
            Self::Consumable { .. } => ClockCategory::Consumable,
            Self::Addiction => ClockCategory::Addiction,
            Self::Progress { .. } => ClockCategory::Progress,
        }
    }

    /// Maximum segments for a clock of this kind.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if a progress clock has no size or a
    /// size outside the configured set.
    pub fn max_segments(&self, rules: &ClockRules, size: Option<u8>) -> Result<u8, DomainError> {
        match self {
            Self::Harm => Ok(rules.harm_max),
            Self::Addiction => Ok(rules.addiction_max),
            Self::Consumable { rarity, .. } => Ok(match rarity {
                Rarity::Common => rules.rarity_sizes.common,
                Rarity::Uncommon => rules.rarity_sizes.uncommon,
                Rarity::Rare => rules.rarity_sizes.rare,
            }),
            Self::Progress { .. } => {
                let size = size.ok_or_else(|| {
                    DomainError::Validation("progress clocks require a size".to_owned())
                })?;
                if rules.progress_sizes.contains(&size) {
                    Ok(size)
                } else {
                    Err(DomainError::Validation(format!(
                        "invalid progress clock size {size}; allowed sizes are {:?}",
                        rules.progress_sizes
                    )))
                }
            }
        }
    }
}

/// A bounded progress counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    /// Clock identifier.
    pub id: Uuid,
    /// The character or crew that owns the clock.
    pub owner_id: Uuid,
    /// Scope shared by parallel holders (the owner's crew).
    pub scope_id: Uuid,
    /// Display label; also the shared-pool key for consumables.
    pub label: String,
    /// Filled segments, always within `[0, max]`.
    pub segments: u8,
    /// Total segments.
    pub max: u8,
    /// Category and its metadata.
    pub kind: ClockKind,
    /// Frozen clocks accept no further segments.
    pub frozen: bool,
    /// Creation order, used for deterministic tie-breaking.
    pub created_seq: u64,
}

impl Clock {
    /// The index category of this clock.
    #[must_use]
    pub fn category(&self) -> ClockCategory {
        self.kind.category()
    }

    /// Whether every segment is filled.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.segments == self.max
    }

    /// Segments left before the clock fills.
    #[must_use]
    pub fn remaining(&self) -> u8 {
        self.max - self.segments
    }

    /// Whether advancing this clock is bad news for the players.
    #[must_use]
    pub fn is_countdown(&self) -> bool {
        matches!(self.kind, ClockKind::Progress { countdown: true })
    }
}

/// Arguments for creating a clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClock {
    /// Identifier for the new clock; unused when a harm clock is replaced.
    pub id: Uuid,
    /// Owning character or crew.
    pub owner_id: Uuid,
    /// Shared-pool scope.
    pub scope_id: Uuid,
    /// Display label.
    pub label: String,
    /// Category and metadata.
    pub kind: ClockKind,
    /// Size; only read for progress clocks.
    #[serde(default)]
    pub size: Option<u8>,
}

impl NewClock {
    /// A harm clock for a character.
    #[must_use]
    pub fn harm(owner_id: Uuid, scope_id: Uuid, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            scope_id,
            label: label.into(),
            kind: ClockKind::Harm,
            size: None,
        }
    }

    /// The addiction clock of a crew.
    #[must_use]
    pub fn addiction(crew_id: Uuid, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: crew_id,
            scope_id: crew_id,
            label: label.into(),
            kind: ClockKind::Addiction,
            size: None,
        }
    }

    /// A consumable clock.
    #[must_use]
    pub fn consumable(
        owner_id: Uuid,
        scope_id: Uuid,
        label: impl Into<String>,
        rarity: Rarity,
        availability: Availability,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            scope_id,
            label: label.into(),
            kind: ClockKind::Consumable {
                rarity,
                availability,
            },
            size: None,
        }
    }

    /// A progress (or countdown threat) clock.
    #[must_use]
    pub fn progress(
        owner_id: Uuid,
        scope_id: Uuid,
        label: impl Into<String>,
        size: u8,
        countdown: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            scope_id,
            label: label.into(),
            kind: ClockKind::Progress { countdown },
            size: Some(size),
        }
    }
}

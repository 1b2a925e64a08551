//! The clock resource engine.
//!
//! Owns every clock in a game and keeps a per-owner, per-category index in
//! step with the primary map. The index is derived data: it is skipped when
//! the engine is serialized and rebuilt on deserialization.

use std::collections::BTreeMap;

use ironwake_core::config::ClockRules;
use ironwake_core::error::DomainError;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::aggregates::{Clock, ClockCategory, ClockKind, NewClock};

/// Result of a create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreateOutcome {
    /// A new clock was added.
    Created {
        /// Identifier of the new clock.
        clock_id: Uuid,
    },
    /// The owner was at the harm cap, so an existing harm clock was relabelled.
    Replaced {
        /// Identifier of the replaced clock.
        clock_id: Uuid,
        /// Label the clock had before replacement.
        previous_label: String,
    },
}

impl CreateOutcome {
    /// The clock that holds the result.
    #[must_use]
    pub fn clock_id(&self) -> Uuid {
        match self {
            Self::Created { clock_id } | Self::Replaced { clock_id, .. } => *clock_id,
        }
    }
}

/// Result of adding or clearing segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentChange {
    /// The clock that changed.
    pub clock_id: Uuid,
    /// Segments after the change.
    pub segments: u8,
    /// The clock's maximum.
    pub max: u8,
    /// Whether this change filled the clock.
    pub filled: bool,
    /// Other clocks frozen as a side effect (shared consumable pool).
    pub frozen_peers: Vec<Uuid>,
}

/// All clocks of one game.
///
/// Equality compares clocks only; the index and sequence counter are derived.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Clock>", into = "Vec<Clock>")]
pub struct ClockEngine {
    clocks: BTreeMap<Uuid, Clock>,
    index: BTreeMap<Uuid, BTreeMap<ClockCategory, Vec<Uuid>>>,
    next_seq: u64,
}

impl PartialEq for ClockEngine {
    fn eq(&self, other: &Self) -> bool {
        self.clocks == other.clocks
    }
}

impl Eq for ClockEngine {}

impl From<Vec<Clock>> for ClockEngine {
    fn from(clocks: Vec<Clock>) -> Self {
        let mut engine = Self::default();
        for clock in clocks {
            engine.next_seq = engine.next_seq.max(clock.created_seq + 1);
            engine.insert(clock);
        }
        engine
    }
}

impl From<ClockEngine> for Vec<Clock> {
    fn from(engine: ClockEngine) -> Self {
        let mut clocks: Vec<Clock> = engine.clocks.into_values().collect();
        clocks.sort_by_key(|c| c.created_seq);
        clocks
    }
}

impl ClockEngine {
    /// An engine with no clocks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of clocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    /// Whether there are no clocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }

    /// Look up a clock.
    #[must_use]
    pub fn get(&self, clock_id: Uuid) -> Option<&Clock> {
        self.clocks.get(&clock_id)
    }

    /// Look up a clock, failing if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for an unknown id.
    pub fn require(&self, clock_id: Uuid) -> Result<&Clock, DomainError> {
        self.clocks
            .get(&clock_id)
            .ok_or(DomainError::AggregateNotFound(clock_id))
    }

    /// Every clock, in creation order.
    #[must_use]
    pub fn all(&self) -> Vec<&Clock> {
        let mut clocks: Vec<&Clock> = self.clocks.values().collect();
        clocks.sort_by_key(|c| c.created_seq);
        clocks
    }

    /// Clocks held by `owner_id`, grouped by category and in creation order
    /// within each category.
    #[must_use]
    pub fn by_owner(&self, owner_id: Uuid) -> Vec<&Clock> {
        self.index
            .get(&owner_id)
            .into_iter()
            .flat_map(BTreeMap::values)
            .flatten()
            .filter_map(|id| self.clocks.get(id))
            .collect()
    }

    /// Clocks of one category held by `owner_id`, in creation order.
    #[must_use]
    pub fn by_owner_and_category(&self, owner_id: Uuid, category: ClockCategory) -> Vec<&Clock> {
        self.index
            .get(&owner_id)
            .and_then(|by_category| by_category.get(&category))
            .into_iter()
            .flatten()
            .filter_map(|id| self.clocks.get(id))
            .collect()
    }

    /// Every clock of a category, in creation order.
    #[must_use]
    pub fn by_category(&self, category: ClockCategory) -> Vec<&Clock> {
        self.all()
            .into_iter()
            .filter(|c| c.category() == category)
            .collect()
    }

    /// Clocks sharing a scope and label; for consumables this is the shared
    /// supply pool.
    #[must_use]
    pub fn by_scope_and_label(&self, scope_id: Uuid, label: &str) -> Vec<&Clock> {
        self.all()
            .into_iter()
            .filter(|c| c.scope_id == scope_id && c.label == label)
            .collect()
    }

    /// Number of harm clocks held by `owner_id`.
    #[must_use]
    pub fn harm_count(&self, owner_id: Uuid) -> usize {
        self.by_owner_and_category(owner_id, ClockCategory::Harm).len()
    }

    /// The addiction clock of `owner_id`, if any.
    #[must_use]
    pub fn addiction_clock(&self, owner_id: Uuid) -> Option<&Clock> {
        self.by_owner_and_category(owner_id, ClockCategory::Addiction)
            .into_iter()
            .next()
    }

    /// Whether any harm clock of `owner_id` is full.
    #[must_use]
    pub fn is_dying(&self, owner_id: Uuid) -> bool {
        self.by_owner_and_category(owner_id, ClockCategory::Harm)
            .iter()
            .any(|c| c.is_full())
    }

    /// Work out what [`ClockEngine::create`] would do without changing
    /// anything.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an empty label, a reused id or a
    /// bad progress size, and `DomainError::Capacity` when the owner already
    /// has an addiction clock.
    pub fn preview_create(
        &self,
        rules: &ClockRules,
        new_clock: &NewClock,
    ) -> Result<CreateOutcome, DomainError> {
        validate_label(&new_clock.label)?;
        if self.clocks.contains_key(&new_clock.id) {
            return Err(DomainError::Validation(format!(
                "clock {} already exists",
                new_clock.id
            )));
        }
        new_clock.kind.max_segments(rules, new_clock.size)?;

        match new_clock.kind {
            ClockKind::Addiction if self.addiction_clock(new_clock.owner_id).is_some() => {
                Err(DomainError::Capacity(format!(
                    "owner {} already has an addiction clock",
                    new_clock.owner_id
                )))
            }
            ClockKind::Harm if self.harm_count(new_clock.owner_id) >= rules.max_harm_clocks => {
                let target = self
                    .replacement_target(new_clock.owner_id)
                    .ok_or_else(|| {
                        DomainError::Capacity(format!(
                            "owner {} is at the harm cap with no clock to replace",
                            new_clock.owner_id
                        ))
                    })?;
                Ok(CreateOutcome::Replaced {
                    clock_id: target.id,
                    previous_label: target.label.clone(),
                })
            }
            _ => Ok(CreateOutcome::Created {
                clock_id: new_clock.id,
            }),
        }
    }

    /// Create a clock.
    ///
    /// When the owner is already at the harm cap, the harm clock with the
    /// fewest segments (earliest created on ties) takes the new label and
    /// keeps its segments; no clock is added.
    ///
    /// # Errors
    ///
    /// As [`ClockEngine::preview_create`].
    pub fn create(
        &mut self,
        rules: &ClockRules,
        new_clock: NewClock,
    ) -> Result<CreateOutcome, DomainError> {
        let outcome = self.preview_create(rules, &new_clock)?;
        match &outcome {
            CreateOutcome::Replaced { clock_id, .. } => {
                if let Some(clock) = self.clocks.get_mut(clock_id) {
                    debug!(
                        %clock_id,
                        owner_id = %clock.owner_id,
                        "harm cap reached, relabelling existing clock"
                    );
                    clock.label = new_clock.label;
                }
            }
            CreateOutcome::Created { .. } => {
                let max = new_clock.kind.max_segments(rules, new_clock.size)?;
                let clock = Clock {
                    id: new_clock.id,
                    owner_id: new_clock.owner_id,
                    scope_id: new_clock.scope_id,
                    label: new_clock.label,
                    segments: 0,
                    max,
                    kind: new_clock.kind,
                    frozen: false,
                    created_seq: self.next_seq,
                };
                self.next_seq += 1;
                self.insert(clock);
            }
        }
        Ok(outcome)
    }

    /// Whether adding `amount` segments would exceed the clock's maximum.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for an unknown id.
    pub fn would_overflow(&self, clock_id: Uuid, amount: u8) -> Result<bool, DomainError> {
        let clock = self.require(clock_id)?;
        Ok(u16::from(clock.segments) + u16::from(amount) > u16::from(clock.max))
    }

    /// Add segments to a clock.
    ///
    /// Filling a consumable freezes it, downgrades its availability and
    /// freezes every other consumable sharing its scope and label. Filling an
    /// addiction clock freezes it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for an unknown id and
    /// `DomainError::Validation` if the clock is frozen or the result would
    /// exceed its maximum.
    pub fn add_segments(&mut self, clock_id: Uuid, amount: u8) -> Result<SegmentChange, DomainError> {
        let clock = self.require(clock_id)?;
        if clock.frozen {
            return Err(DomainError::Validation(format!(
                "clock {clock_id} is frozen"
            )));
        }
        if self.would_overflow(clock_id, amount)? {
            return Err(DomainError::Validation(format!(
                "adding {amount} segments to clock {clock_id} would exceed its maximum ({}/{})",
                clock.segments, clock.max
            )));
        }

        let scope_id = clock.scope_id;
        let label = clock.label.clone();

        let clock = self
            .clocks
            .get_mut(&clock_id)
            .ok_or(DomainError::AggregateNotFound(clock_id))?;
        clock.segments += amount;
        let filled = amount > 0 && clock.is_full();
        let (segments, max) = (clock.segments, clock.max);

        let mut pool_depleted = false;
        if filled {
            match &mut clock.kind {
                ClockKind::Consumable { availability, .. } => {
                    *availability = availability.downgraded();
                    clock.frozen = true;
                    pool_depleted = true;
                }
                ClockKind::Addiction => clock.frozen = true,
                ClockKind::Harm | ClockKind::Progress { .. } => {}
            }
        }
        let frozen_peers = if pool_depleted {
            debug!(%clock_id, %scope_id, label = %label, "consumable pool depleted");
            self.freeze_pool(clock_id, scope_id, &label)
        } else {
            Vec::new()
        };

        Ok(SegmentChange {
            clock_id,
            segments,
            max,
            filled,
            frozen_peers,
        })
    }

    /// Remove segments from a clock, flooring at zero. Frozen clocks stay
    /// frozen.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for an unknown id.
    pub fn clear_segments(&mut self, clock_id: Uuid, amount: u8) -> Result<SegmentChange, DomainError> {
        let clock = self
            .clocks
            .get_mut(&clock_id)
            .ok_or(DomainError::AggregateNotFound(clock_id))?;
        clock.segments = clock.segments.saturating_sub(amount);
        Ok(SegmentChange {
            clock_id,
            segments: clock.segments,
            max: clock.max,
            filled: false,
            frozen_peers: Vec::new(),
        })
    }

    /// Change a clock's label.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for an unknown id and
    /// `DomainError::Validation` for an empty label.
    pub fn rename(&mut self, clock_id: Uuid, label: &str) -> Result<(), DomainError> {
        validate_label(label)?;
        let clock = self
            .clocks
            .get_mut(&clock_id)
            .ok_or(DomainError::AggregateNotFound(clock_id))?;
        label.clone_into(&mut clock.label);
        Ok(())
    }

    /// Move a clock to a different category, re-checking capacity and size.
    ///
    /// Progress clocks take `size` when given and otherwise keep their current
    /// maximum, which must still be an allowed size.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Capacity` if the owner has no room in the target
    /// category and `DomainError::Validation` if the new size is invalid or
    /// smaller than the filled segments.
    pub fn change_category(
        &mut self,
        rules: &ClockRules,
        clock_id: Uuid,
        kind: ClockKind,
        size: Option<u8>,
    ) -> Result<(), DomainError> {
        let clock = self.require(clock_id)?;
        let owner_id = clock.owner_id;
        let from = clock.category();
        let to = kind.category();

        if from != to {
            match to {
                ClockCategory::Harm if self.harm_count(owner_id) >= rules.max_harm_clocks => {
                    return Err(DomainError::Capacity(format!(
                        "owner {owner_id} is at the harm clock cap"
                    )));
                }
                ClockCategory::Addiction if self.addiction_clock(owner_id).is_some() => {
                    return Err(DomainError::Capacity(format!(
                        "owner {owner_id} already has an addiction clock"
                    )));
                }
                _ => {}
            }
        }

        let max = kind.max_segments(rules, size.or(Some(clock.max)))?;
        if clock.segments > max {
            return Err(DomainError::Validation(format!(
                "clock {clock_id} has {} segments, more than the new maximum {max}",
                clock.segments
            )));
        }

        if from != to {
            self.unindex(owner_id, from, clock_id);
        }
        let clock = self
            .clocks
            .get_mut(&clock_id)
            .ok_or(DomainError::AggregateNotFound(clock_id))?;
        clock.kind = kind;
        clock.max = max;
        if !matches!(kind, ClockKind::Consumable { .. } | ClockKind::Addiction) {
            clock.frozen = false;
        }
        if from != to {
            self.index_insert(owner_id, to, clock_id);
        }
        Ok(())
    }

    /// Freeze or unfreeze a clock.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for an unknown id.
    pub fn set_frozen(&mut self, clock_id: Uuid, frozen: bool) -> Result<(), DomainError> {
        let clock = self
            .clocks
            .get_mut(&clock_id)
            .ok_or(DomainError::AggregateNotFound(clock_id))?;
        clock.frozen = frozen;
        Ok(())
    }

    /// Remove a clock.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for an unknown id.
    pub fn delete(&mut self, clock_id: Uuid) -> Result<Clock, DomainError> {
        let clock = self
            .clocks
            .remove(&clock_id)
            .ok_or(DomainError::AggregateNotFound(clock_id))?;
        self.unindex(clock.owner_id, clock.category(), clock_id);
        Ok(clock)
    }

    /// Move every clock held by `owner_id` into `scope_id`; returns how many
    /// clocks changed scope.
    pub fn rescope(&mut self, owner_id: Uuid, scope_id: Uuid) -> usize {
        let mut moved = 0;
        for clock in self.clocks.values_mut() {
            if clock.owner_id == owner_id && clock.scope_id != scope_id {
                clock.scope_id = scope_id;
                moved += 1;
            }
        }
        moved
    }

    fn replacement_target(&self, owner_id: Uuid) -> Option<&Clock> {
        self.by_owner_and_category(owner_id, ClockCategory::Harm)
            .into_iter()
            .min_by_key(|c| (c.segments, c.created_seq))
    }

    fn freeze_pool(&mut self, filled_id: Uuid, scope_id: Uuid, label: &str) -> Vec<Uuid> {
        let peers: Vec<Uuid> = self
            .by_scope_and_label(scope_id, label)
            .into_iter()
            .filter(|c| {
                c.id != filled_id && !c.frozen && c.category() == ClockCategory::Consumable
            })
            .map(|c| c.id)
            .collect();
        for id in &peers {
            if let Some(clock) = self.clocks.get_mut(id) {
                clock.frozen = true;
            }
        }
        peers
    }

    fn insert(&mut self, clock: Clock) {
        let (id, owner_id, category) = (clock.id, clock.owner_id, clock.category());
        self.clocks.insert(id, clock);
        self.index_insert(owner_id, category, id);
    }

    fn index_insert(&mut self, owner_id: Uuid, category: ClockCategory, clock_id: Uuid) {
        let clocks = &self.clocks;
        let ids = self
            .index
            .entry(owner_id)
            .or_default()
            .entry(category)
            .or_default();
        ids.push(clock_id);
        ids.sort_by_key(|id| clocks.get(id).map_or(u64::MAX, |c| c.created_seq));
    }

    fn unindex(&mut self, owner_id: Uuid, category: ClockCategory, clock_id: Uuid) {
        if let Some(by_category) = self.index.get_mut(&owner_id) {
            if let Some(ids) = by_category.get_mut(&category) {
                ids.retain(|id| *id != clock_id);
                if ids.is_empty() {
                    by_category.remove(&category);
                }
            }
            if by_category.is_empty() {
                self.index.remove(&owner_id);
            }
        }
    }
}

fn validate_label(label: &str) -> Result<(), DomainError> {
    if label.trim().is_empty() {
        return Err(DomainError::Validation(
            "clock label must not be empty".to_owned(),
        ));
    }
    Ok(())
}

//! The authority — sole writer of the shared store.
//!
//! Every mutation goes through [`Authority::execute_batch`]: validate the whole
//! batch against the pre-batch store, apply it to a clone, swap on success,
//! then record one history entry, send one broadcast and one refresh signal.

use std::collections::HashSet;
use std::sync::Arc;

use ironwake_core::command::Command;
use ironwake_core::config::RulesConfig;
use ironwake_core::error::DomainError;
use ironwake_core::history::CommandHistoryEntry;
use ironwake_core::repository::StoredSnapshot;
use ironwake_core::rng::DeterministicRng;
use ironwake_core::time::TimeSource;
use ironwake_turn::{PlayerRoundState, TurnMachine, TurnOutcome};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::envelopes::{
    BroadcastEnvelope, PlayerAction, RefreshSignal, RequestEnvelope, ResponseEnvelope,
};
use crate::domain::history::{CommandHistory, HistoryStats, PruneBaseline};
use crate::domain::operations::Operation;
use crate::domain::store::GameStore;

/// Result of a committed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Store version after the commit.
    pub version: u64,
    /// History entry recorded for the commit.
    pub entry_id: Uuid,
    /// Entities whose views were signalled.
    pub entity_ids: Vec<Uuid>,
}

/// A snapshot ready for the persistence collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFlush {
    /// The snapshot to save.
    pub snapshot: StoredSnapshot,
    /// Last history entry included in the snapshot's tail.
    pub through: Option<Uuid>,
}

/// Owns the store, the history and the outbound channels.
pub struct Authority {
    store: GameStore,
    rules: Arc<RulesConfig>,
    history: CommandHistory,
    time: Arc<dyn TimeSource>,
    rng: Box<dyn DeterministicRng>,
    broadcasts: broadcast::Sender<BroadcastEnvelope>,
    refreshes: broadcast::Sender<RefreshSignal>,
}

impl std::fmt::Debug for Authority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authority")
            .field("version", &self.store.version)
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl Authority {
    /// An authority over `store`; broadcast channels hold `capacity`
    /// messages per lagging receiver.
    #[must_use]
    pub fn new(
        store: GameStore,
        rules: Arc<RulesConfig>,
        time: Arc<dyn TimeSource>,
        rng: Box<dyn DeterministicRng>,
        capacity: usize,
    ) -> Self {
        let (broadcasts, _) = broadcast::channel(capacity.max(1));
        let (refreshes, _) = broadcast::channel(capacity.max(1));
        Self {
            store,
            rules,
            history: CommandHistory::new(),
            time,
            rng,
            broadcasts,
            refreshes,
        }
    }

    /// The committed store.
    #[must_use]
    pub fn store(&self) -> &GameStore {
        &self.store
    }

    /// The rules every commit is checked against.
    #[must_use]
    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    /// The command history.
    #[must_use]
    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    /// Sender used to hand out broadcast subscriptions.
    #[must_use]
    pub fn broadcast_sender(&self) -> broadcast::Sender<BroadcastEnvelope> {
        self.broadcasts.clone()
    }

    /// Sender used to hand out refresh subscriptions.
    #[must_use]
    pub fn refresh_sender(&self) -> broadcast::Sender<RefreshSignal> {
        self.refreshes.clone()
    }

    /// Commit a single operation.
    ///
    /// # Errors
    ///
    /// See [`Authority::execute_batch`].
    pub fn execute(
        &mut self,
        operation: Operation,
        request_id: Option<String>,
    ) -> Result<CommitReceipt, DomainError> {
        self.execute_batch(vec![operation], request_id)
    }

    /// Commit `operations` atomically.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an empty batch or one with more
    /// than one transition, and the first operation error otherwise. On error
    /// the store is unchanged and nothing is recorded or broadcast.
    #[instrument(skip(self, operations), fields(operations = operations.len()))]
    pub fn execute_batch(
        &mut self,
        operations: Vec<Operation>,
        request_id: Option<String>,
    ) -> Result<CommitReceipt, DomainError> {
        let Some(lead) = operations
            .iter()
            .find(|op| op.is_transition())
            .or_else(|| operations.first())
        else {
            return Err(DomainError::Validation("empty batch".into()));
        };
        if operations.iter().filter(|op| op.is_transition()).count() > 1 {
            return Err(DomainError::Validation(
                "a batch may contain at most one transition".into(),
            ));
        }

        let mut created = HashSet::new();
        for operation in &operations {
            operation.validate(&self.store, &self.rules, &mut created)?;
        }

        let mut working = self.store.clone();
        for operation in &operations {
            operation.apply(&mut working, &self.rules)?;
        }
        working.version += 1;

        let payload = serde_json::to_value(&operations)
            .map_err(|e| DomainError::Infrastructure(format!("encode operations: {e}")))?;
        let entry = CommandHistoryEntry {
            entry_id: Uuid::new_v4(),
            aggregate: lead.aggregate(),
            command_type: lead.command_type().to_owned(),
            operation_types: operations
                .iter()
                .map(|op| op.command_type().to_owned())
                .collect(),
            request_id: request_id.clone(),
            correlation_id: Uuid::new_v4(),
            payload,
            store_version: working.version,
            recorded_at: self.time.now(),
        };
        let receipt = CommitReceipt {
            version: working.version,
            entry_id: entry.entry_id,
            entity_ids: entity_ids(&operations),
        };
        let force = operations.iter().any(Command::is_structural);

        self.store = working;
        self.history.append(entry);
        self.broadcast(request_id, false);
        self.refresh(receipt.entity_ids.clone(), force);

        info!(
            version = receipt.version,
            command_type = lead.command_type(),
            "batch committed"
        );
        Ok(receipt)
    }

    /// Replace a round state in place without history or broadcast.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the edit would change the phase.
    pub fn update_silently(&mut self, round_state: PlayerRoundState) -> Result<(), DomainError> {
        let current = self.store.phase_of(round_state.character_id);
        if current != round_state.phase() {
            return Err(DomainError::Validation(format!(
                "silent update may not change phase {current} to {}",
                round_state.phase()
            )));
        }
        debug!(character_id = %round_state.character_id, "round state updated silently");
        self.store
            .round_states
            .insert(round_state.character_id, round_state);
        Ok(())
    }

    /// Broadcast the current store with `forceSync`.
    pub fn resync(&mut self) {
        info!(version = self.store.version, "forced resync");
        self.broadcast(None, true);
        self.refresh(Vec::new(), true);
    }

    /// Handle a peer request and produce its response.
    #[instrument(skip(self, request), fields(kind = %request.kind, request_id = %request.request_id))]
    pub fn handle_request(&mut self, request: RequestEnvelope) -> ResponseEnvelope {
        match self.dispatch(&request) {
            Ok(()) => ResponseEnvelope::confirmed(request.request_id),
            Err(error) => {
                warn!(error = %error, "request rejected");
                ResponseEnvelope::rejected(request.request_id, &error)
            }
        }
    }

    fn dispatch(&mut self, request: &RequestEnvelope) -> Result<(), DomainError> {
        let action = request.action()?;
        let character_id = request.character_id;
        let request_id = Some(request.request_id.clone());
        let rules = Arc::clone(&self.rules);
        let machine = TurnMachine::new(&rules);

        let outcome = match action {
            PlayerAction::Select(edit) => {
                let outcome = machine.select(&self.store, character_id, edit)?;
                return self.commit_turn(outcome, false, request_id);
            }
            PlayerAction::UpdateConsequence(edit) => {
                let round_state = machine.update_draft(&self.store, character_id, edit)?;
                return self.update_silently(round_state);
            }
            PlayerAction::Clock(command) => {
                return self
                    .execute(Operation::Clock { command }, request_id)
                    .map(|_| ());
            }
            PlayerAction::Roster(command) => {
                return self
                    .execute(Operation::Roster { command }, request_id)
                    .map(|_| ());
            }
            PlayerAction::CommitAction => machine.commit_action(&self.store, character_id)?,
            PlayerAction::Roll => machine.roll(&self.store, character_id, self.rng.as_mut())?,
            PlayerAction::UseStimulant => machine.use_stimulant(&self.store, character_id)?,
            PlayerAction::ResolveStimulant => {
                machine.resolve_stimulant(&self.store, character_id, self.rng.as_mut())?
            }
            PlayerAction::ReturnFromLock => machine.return_from_lock(&self.store, character_id)?,
            PlayerAction::AcceptConsequence => {
                machine.accept_consequence(&self.store, character_id)?
            }
            PlayerAction::ResolveSuccess(choice) => {
                machine.resolve_success(&self.store, character_id, choice)?
            }
            PlayerAction::CloseTurn => machine.close_turn(&self.store, character_id)?,
            PlayerAction::BeginTurn => machine.begin_turn(&self.store, character_id)?,
            PlayerAction::Cancel => machine.cancel(&self.store, character_id)?,
        };
        self.commit_turn(outcome, true, request_id)
    }

    fn commit_turn(
        &mut self,
        outcome: TurnOutcome,
        transition: bool,
        request_id: Option<String>,
    ) -> Result<(), DomainError> {
        let character_id = outcome.round_state.character_id;
        let next = Box::new(outcome.round_state);
        let mut operations = Vec::with_capacity(outcome.effects.len() + 1);
        operations.push(if transition {
            Operation::Transition {
                character_id,
                expected: outcome.expected,
                next,
            }
        } else {
            Operation::EditRoundState { character_id, next }
        });
        operations.extend(outcome.effects.into_iter().map(Operation::from));

        self.execute_batch(operations, request_id)?;
        for dying in outcome.dying {
            warn!(character_id = %dying, "character is dying");
        }
        Ok(())
    }

    /// History statistics.
    #[must_use]
    pub fn history_stats(&self) -> HistoryStats {
        self.history.stats()
    }

    /// Drop all history, keeping the current store as the baseline.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store cannot be serialized.
    pub fn prune_history(&mut self) -> Result<PruneBaseline, DomainError> {
        let state = encode_store(&self.store)?;
        let baseline = self
            .history
            .prune(self.store.version, state, self.time.now())
            .clone();
        info!(removed = baseline.removed, version = baseline.version, "history pruned");
        Ok(baseline)
    }

    /// Build a snapshot of the store plus the pending history tail.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store cannot be serialized.
    pub fn prepare_flush(&self) -> Result<PendingFlush, DomainError> {
        let tail = self.history.pending_tail();
        let version = i64::try_from(self.store.version)
            .map_err(|_| DomainError::Infrastructure("store version overflow".into()))?;
        Ok(PendingFlush {
            snapshot: StoredSnapshot {
                snapshot_id: Uuid::new_v4(),
                version,
                state: encode_store(&self.store)?,
                history_tail: tail.to_vec(),
                taken_at: self.time.now(),
            },
            through: tail.last().map(|entry| entry.entry_id),
        })
    }

    /// Record that history up to `through` has been persisted.
    pub fn mark_flushed(&mut self, through: Uuid) {
        self.history.mark_flushed(through);
    }

    fn broadcast(&self, request_id: Option<String>, force_sync: bool) {
        // No subscribers is not an error.
        let _ = self.broadcasts.send(BroadcastEnvelope {
            state: self.store.clone(),
            last_confirmed_request_id: request_id,
            force_sync,
        });
    }

    fn refresh(&self, entity_ids: Vec<Uuid>, force: bool) {
        let _ = self.refreshes.send(RefreshSignal { entity_ids, force });
    }
}

fn entity_ids(operations: &[Operation]) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for id in operations.iter().flat_map(Operation::entity_ids) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

fn encode_store(store: &GameStore) -> Result<serde_json::Value, DomainError> {
    serde_json::to_value(store)
        .map_err(|e| DomainError::Infrastructure(format!("encode store: {e}")))
}

/// Decode a store from a persisted snapshot.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the state does not decode.
pub fn decode_store(snapshot: &StoredSnapshot) -> Result<GameStore, DomainError> {
    serde_json::from_value(snapshot.state.clone())
        .map_err(|e| DomainError::Infrastructure(format!("decode store: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ironwake_clocks::{ClockCommand, NewClock};
    use ironwake_core::history::AggregateKind;
    use ironwake_test_support::{CrewFixture, FixedTime, MockRng};
    use ironwake_turn::{SelectionEdit, TurnPhase};

    struct Harness {
        authority: Authority,
        fixture: CrewFixture,
        broadcasts: broadcast::Receiver<BroadcastEnvelope>,
        refreshes: broadcast::Receiver<RefreshSignal>,
    }

    fn harness() -> Harness {
        let rules = Arc::new(RulesConfig::default());
        let fixture = CrewFixture::new(2);
        let store = GameStore {
            roster: fixture.roster(&rules.momentum),
            ..GameStore::default()
        };
        let time = Arc::new(FixedTime(
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        ));
        let authority = Authority::new(store, rules, time, Box::new(MockRng), 16);
        let broadcasts = authority.broadcast_sender().subscribe();
        let refreshes = authority.refresh_sender().subscribe();
        Harness {
            authority,
            fixture,
            broadcasts,
            refreshes,
        }
    }

    fn request(action: &PlayerAction, character_id: Uuid, id: &str) -> RequestEnvelope {
        RequestEnvelope::new(action, character_id, id).unwrap()
    }

    fn harm(owner: Uuid, scope: Uuid) -> Operation {
        Operation::Clock {
            command: ClockCommand::Create {
                clock: NewClock::harm(owner, scope, "Bruised"),
            },
        }
    }

    #[test]
    fn test_execute_records_one_entry_broadcast_and_refresh() {
        // Arrange
        let mut h = harness();
        let owner = h.fixture.leader();

        // Act
        let receipt = h
            .authority
            .execute(harm(owner, h.fixture.crew_id), Some("r-1".into()))
            .unwrap();

        // Assert
        assert_eq!(receipt.version, 1);
        assert_eq!(h.authority.history().len(), 1);
        let entry = &h.authority.history().entries()[0];
        assert_eq!(entry.aggregate.kind, AggregateKind::Clock);
        assert_eq!(entry.request_id.as_deref(), Some("r-1"));
        assert_eq!(
            entry.recorded_at,
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
        );

        let broadcast = h.broadcasts.try_recv().unwrap();
        assert_eq!(broadcast.last_confirmed_request_id.as_deref(), Some("r-1"));
        assert!(!broadcast.force_sync);
        assert_eq!(broadcast.state.version, 1);
        assert!(h.broadcasts.try_recv().is_err());

        let refresh = h.refreshes.try_recv().unwrap();
        assert!(refresh.entity_ids.contains(&owner));
        assert!(refresh.force);
        assert!(h.refreshes.try_recv().is_err());
    }

    #[test]
    fn test_batch_is_one_commit() {
        let mut h = harness();
        let crew = h.fixture.crew_id;
        let ops = h
            .fixture
            .member_ids
            .iter()
            .map(|id| harm(*id, crew))
            .collect();

        h.authority.execute_batch(ops, None).unwrap();

        assert_eq!(h.authority.store().clocks.len(), 2);
        assert_eq!(h.authority.store().version, 1);
        assert_eq!(h.authority.history().len(), 1);
        assert_eq!(h.authority.history().entries()[0].operation_types.len(), 2);
        assert!(h.broadcasts.try_recv().is_ok());
        assert!(h.broadcasts.try_recv().is_err());
    }

    #[test]
    fn test_batch_with_two_transitions_is_rejected() {
        let mut h = harness();
        let ops = h
            .fixture
            .member_ids
            .iter()
            .map(|id| Operation::Transition {
                character_id: *id,
                expected: TurnPhase::Decision,
                next: Box::new(PlayerRoundState::new(*id)),
            })
            .collect();

        let result = h.authority.execute_batch(ops, None);

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(h.authority.store().version, 0);
        assert!(h.authority.history().is_empty());
        assert!(h.broadcasts.try_recv().is_err());
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let mut h = harness();
        assert!(h.authority.execute_batch(Vec::new(), None).is_err());
    }

    #[test]
    fn test_failed_batch_leaves_store_untouched() {
        let mut h = harness();
        let crew = h.fixture.crew_id;
        let ops = vec![
            harm(h.fixture.leader(), crew),
            Operation::Clock {
                command: ClockCommand::AddSegments {
                    clock_id: Uuid::new_v4(),
                    amount: 1,
                },
            },
        ];

        let result = h.authority.execute_batch(ops, None);

        assert!(matches!(result, Err(DomainError::AggregateNotFound(_))));
        assert!(h.authority.store().clocks.is_empty());
        assert!(h.authority.history().is_empty());
    }

    #[test]
    fn test_select_request_commits_edit_and_confirms() {
        let mut h = harness();
        let id = h.fixture.leader();
        let action = PlayerAction::Select(SelectionEdit::Approach(Some(
            ironwake_character::Approach::Force,
        )));

        let response = h.authority.handle_request(request(&action, id, "p-1"));

        assert!(response.success);
        assert_eq!(response.last_confirmed_request_id, "p-1");
        let state = &h.authority.store().round_states[&id];
        assert_eq!(state.phase(), TurnPhase::Decision);
        assert_eq!(
            h.authority.history().entries()[0].command_type,
            "turn.edit_round_state"
        );
    }

    #[test]
    fn test_illegal_transition_is_rejected_with_code() {
        let mut h = harness();
        let id = h.fixture.leader();

        let response = h
            .authority
            .handle_request(request(&PlayerAction::Roll, id, "p-2"));

        assert!(!response.success);
        assert_eq!(response.error_code.as_deref(), Some("validation_error"));
        assert_eq!(response.last_confirmed_request_id, "p-2");
        assert!(h.authority.history().is_empty());
        assert!(h.broadcasts.try_recv().is_err());
    }

    #[test]
    fn test_reentrant_commit_is_rejected() {
        let mut h = harness();
        let id = h.fixture.leader();
        let select = PlayerAction::Select(SelectionEdit::Approach(Some(
            ironwake_character::Approach::Force,
        )));
        h.authority.handle_request(request(&select, id, "p-1"));

        let first = h
            .authority
            .handle_request(request(&PlayerAction::CommitAction, id, "p-2"));
        let second = h
            .authority
            .handle_request(request(&PlayerAction::CommitAction, id, "p-3"));

        assert!(first.success);
        assert!(!second.success);
        assert_eq!(h.authority.store().phase_of(id), TurnPhase::Rolling);
    }

    #[test]
    fn test_silent_update_skips_history_and_broadcast() {
        let mut h = harness();
        let id = h.fixture.leader();
        let mut state = PlayerRoundState::new(id);
        state.selection.position = ironwake_rules::Position::Desperate;

        h.authority.update_silently(state.clone()).unwrap();

        assert_eq!(h.authority.store().round_states[&id], state);
        assert_eq!(h.authority.store().version, 0);
        assert!(h.authority.history().is_empty());
        assert!(h.broadcasts.try_recv().is_err());
    }

    #[test]
    fn test_resync_forces_sync_without_confirmation() {
        let mut h = harness();

        h.authority.resync();

        let broadcast = h.broadcasts.try_recv().unwrap();
        assert!(broadcast.force_sync);
        assert!(broadcast.last_confirmed_request_id.is_none());
        assert!(h.refreshes.try_recv().unwrap().force);
    }

    #[test]
    fn test_prepare_flush_carries_pending_tail() {
        let mut h = harness();
        let crew = h.fixture.crew_id;
        h.authority
            .execute(harm(h.fixture.leader(), crew), None)
            .unwrap();

        let pending = h.authority.prepare_flush().unwrap();
        h.authority.mark_flushed(pending.through.unwrap());

        assert_eq!(pending.snapshot.version, 1);
        assert_eq!(pending.snapshot.history_tail.len(), 1);
        assert_eq!(decode_store(&pending.snapshot).unwrap(), *h.authority.store());
        assert!(h.authority.prepare_flush().unwrap().through.is_none());
    }

    #[test]
    fn test_prune_history_keeps_store() {
        let mut h = harness();
        let crew = h.fixture.crew_id;
        h.authority
            .execute(harm(h.fixture.leader(), crew), None)
            .unwrap();

        let baseline = h.authority.prune_history().unwrap();

        assert_eq!(baseline.removed, 1);
        assert!(h.authority.history().is_empty());
        assert_eq!(h.authority.store().clocks.len(), 1);
    }
}

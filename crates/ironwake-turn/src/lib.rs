//! Ironwake — Turn Resolution State Machine.
//!
//! A per-character workflow that takes an action from selection through the
//! roll, the optional stimulant sub-flow and consequence negotiation to the
//! end of the turn. The machine never mutates shared state itself: every
//! call returns the next round state plus the clock and roster commands the
//! caller must commit together with it.

pub mod context;
pub mod machine;
pub mod pool;
pub mod state;

pub use context::TurnContext;
pub use machine::{DraftEdit, SelectionEdit, SuccessChoice, TurnEffect, TurnMachine, TurnOutcome};
pub use pool::{assemble_action, ActionAssembly};
pub use state::{
    ActionSelection, AppliedConsequence, ClockTarget, CommittedAction, ConsequenceDraft,
    ConsequenceKind, PlayerRoundState, PushMode, SecondarySource, TraitDraft, TurnPhase,
    TurnState,
};

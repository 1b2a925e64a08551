//! Peer-boundary messages.
//!
//! Requests travel from a satellite to the authority and get exactly one
//! response; broadcasts travel from the authority to every peer. Field names
//! are camelCase on the wire.

use ironwake_character::RosterCommand;
use ironwake_clocks::ClockCommand;
use ironwake_core::error::DomainError;
use ironwake_turn::{DraftEdit, SelectionEdit, SuccessChoice};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::store::GameStore;

/// How a satellite waits on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    /// The caller suspends until the response arrives.
    Blocking,
    /// The caller applies a local guess and does not wait.
    Optimistic,
}

/// A typed action a peer asks the authority to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum PlayerAction {
    /// Edit the selection in `Decision`.
    Select(SelectionEdit),
    /// Commit the selection and start rolling.
    CommitAction,
    /// Roll the committed pool.
    Roll,
    /// Use a stimulant to reroll.
    UseStimulant,
    /// Roll the addiction die for the stimulant.
    ResolveStimulant,
    /// Leave the stimulant lock.
    ReturnFromLock,
    /// Edit the consequence draft.
    UpdateConsequence(DraftEdit),
    /// Accept and apply the drafted consequence.
    AcceptConsequence,
    /// Spend the success segments.
    ResolveSuccess(SuccessChoice),
    /// Close the finished turn.
    CloseTurn,
    /// Start a new turn after `Complete`.
    BeginTurn,
    /// Abandon the turn.
    Cancel,
    /// A GM clock operation.
    Clock(ClockCommand),
    /// A GM roster or momentum operation.
    Roster(RosterCommand),
}

impl PlayerAction {
    /// Request class of the action.
    #[must_use]
    pub fn class(&self) -> RequestClass {
        match self {
            Self::Select(_) | Self::UpdateConsequence(_) => RequestClass::Optimistic,
            _ => RequestClass::Blocking,
        }
    }

    /// Wire name of the action, as used in the `kind` field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Select(_) => "select",
            Self::CommitAction => "commit_action",
            Self::Roll => "roll",
            Self::UseStimulant => "use_stimulant",
            Self::ResolveStimulant => "resolve_stimulant",
            Self::ReturnFromLock => "return_from_lock",
            Self::UpdateConsequence(_) => "update_consequence",
            Self::AcceptConsequence => "accept_consequence",
            Self::ResolveSuccess(_) => "resolve_success",
            Self::CloseTurn => "close_turn",
            Self::BeginTurn => "begin_turn",
            Self::Cancel => "cancel",
            Self::Clock(_) => "clock",
            Self::Roster(_) => "roster",
        }
    }
}

/// Request envelope: `{kind, payload, characterId, requestId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    /// Action name.
    pub kind: String,
    /// Action arguments; `null` for actions without any.
    #[serde(default)]
    pub payload: Value,
    /// The requesting character.
    pub character_id: Uuid,
    /// Sender-chosen id echoed back as the confirmation id.
    pub request_id: String,
}

impl RequestEnvelope {
    /// Wrap `action` for `character_id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the action cannot be
    /// serialized.
    pub fn new(
        action: &PlayerAction,
        character_id: Uuid,
        request_id: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let mut value = serde_json::to_value(action)
            .map_err(|e| DomainError::Infrastructure(format!("encode request: {e}")))?;
        let payload = value
            .as_object_mut()
            .and_then(|object| object.remove("payload"))
            .unwrap_or(Value::Null);
        Ok(Self {
            kind: action.kind().to_owned(),
            payload,
            character_id,
            request_id: request_id.into(),
        })
    }

    /// Decode the typed action.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an unknown kind or a payload that
    /// does not match it.
    pub fn action(&self) -> Result<PlayerAction, DomainError> {
        let mut object = Map::new();
        object.insert("kind".into(), Value::String(self.kind.clone()));
        if !self.payload.is_null() {
            object.insert("payload".into(), self.payload.clone());
        }
        serde_json::from_value(Value::Object(object))
            .map_err(|e| DomainError::Validation(format!("malformed {} request: {e}", self.kind)))
    }
}

/// Response envelope: `{success, error?, lastConfirmedRequestId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// Whether the request committed.
    pub success: bool,
    /// Rejection message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stable error code of the rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// The request this response answers.
    pub last_confirmed_request_id: String,
}

impl ResponseEnvelope {
    /// A success response for `request_id`.
    #[must_use]
    pub fn confirmed(request_id: impl Into<String>) -> Self {
        Self {
            success: true,
            error: None,
            error_code: None,
            last_confirmed_request_id: request_id.into(),
        }
    }

    /// A rejection of `request_id` carrying `error`.
    #[must_use]
    pub fn rejected(request_id: impl Into<String>, error: &DomainError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            error_code: Some(error.code().to_owned()),
            last_confirmed_request_id: request_id.into(),
        }
    }
}

/// Broadcast envelope: `{state, lastConfirmedRequestId|null, forceSync}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastEnvelope {
    /// Full store after the commit.
    pub state: GameStore,
    /// Request id of the commit, if a peer request produced it.
    pub last_confirmed_request_id: Option<String>,
    /// Peers must apply this broadcast unconditionally.
    pub force_sync: bool,
}

/// Outbound refresh signal for views bound to entity ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSignal {
    /// Affected entities; empty with `force` means everything.
    pub entity_ids: Vec<Uuid>,
    /// Views must rebuild rather than patch.
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironwake_rules::Position;
    use serde_json::json;

    #[test]
    fn test_request_round_trips_through_kind_and_payload() {
        let character_id = Uuid::new_v4();
        let action = PlayerAction::Select(SelectionEdit::Position(Position::Desperate));

        let envelope = RequestEnvelope::new(&action, character_id, "peer-1").unwrap();

        assert_eq!(envelope.kind, "select");
        assert_eq!(envelope.payload, json!({"field": "position", "value": "desperate"}));
        assert_eq!(envelope.action().unwrap(), action);
    }

    #[test]
    fn test_unit_action_has_null_payload() {
        let envelope = RequestEnvelope::new(&PlayerAction::Roll, Uuid::new_v4(), "r").unwrap();
        assert!(envelope.payload.is_null());
        assert_eq!(envelope.action().unwrap(), PlayerAction::Roll);
    }

    #[test]
    fn test_wire_names_are_camel_case() {
        let character_id = Uuid::nil();
        let value = serde_json::to_value(
            RequestEnvelope::new(&PlayerAction::CloseTurn, character_id, "r-9").unwrap(),
        )
        .unwrap();

        assert_eq!(value["characterId"], json!(character_id));
        assert_eq!(value["requestId"], json!("r-9"));
    }

    #[test]
    fn test_unknown_kind_is_a_validation_error() {
        let envelope = RequestEnvelope {
            kind: "teleport".into(),
            payload: Value::Null,
            character_id: Uuid::new_v4(),
            request_id: "r".into(),
        };
        assert!(matches!(envelope.action(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_classes() {
        assert_eq!(PlayerAction::Roll.class(), RequestClass::Blocking);
        assert_eq!(
            PlayerAction::UpdateConsequence(DraftEdit::SetDefensive { enabled: true }).class(),
            RequestClass::Optimistic
        );
    }

    #[test]
    fn test_rejection_carries_error_code() {
        let response = ResponseEnvelope::rejected("r", &DomainError::Validation("nope".into()));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["lastConfirmedRequestId"], json!("r"));
        assert!(value["errorCode"].is_string());
    }
}

//! Event record types for the event log.

use serde::{Deserialize, Serialize};

/// Optional links from an event to the business entities it concerns.
///
/// Each field is stored in its own nullable column so the log can be
/// filtered by entity without parsing payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventReferences {
    /// Related participant.
    #[serde(rename = "participantId", skip_serializing_if = "Option::is_none", default)]
    pub participant_id: Option<String>,
    /// Related agent.
    #[serde(rename = "agentId", skip_serializing_if = "Option::is_none", default)]
    pub agent_id: Option<String>,
    /// Related service group.
    #[serde(rename = "serviceGroupId", skip_serializing_if = "Option::is_none", default)]
    pub service_group_id: Option<String>,
    /// Related token.
    #[serde(rename = "tokenId", skip_serializing_if = "Option::is_none", default)]
    pub token_id: Option<String>,
    /// Related service pool.
    #[serde(rename = "servicePoolId", skip_serializing_if = "Option::is_none", default)]
    pub service_pool_id: Option<String>,
    /// Related vault secret.
    #[serde(rename = "vaultSecretId", skip_serializing_if = "Option::is_none", default)]
    pub vault_secret_id: Option<String>,
}

/// An event to be appended. The store assigns `id`, `sequence`, and
/// timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Kind of actor that caused the event (e.g. `participant`, `agent`).
    #[serde(rename = "initiatorType")]
    pub initiator_type: String,
    /// Identifier of that actor.
    #[serde(rename = "initiatorId")]
    pub initiator_id: String,
    /// Event type, e.g. `TOKEN_ISSUED`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Arbitrary structured payload.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Related entity identifiers.
    #[serde(flatten)]
    pub references: EventReferences,
}

impl NewEvent {
    /// Creates an event with no entity references.
    pub fn new(
        initiator_type: impl Into<String>,
        initiator_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            initiator_type: initiator_type.into(),
            initiator_id: initiator_id.into(),
            event_type: event_type.into(),
            payload,
            references: EventReferences::default(),
        }
    }

    /// Replaces the entity references.
    pub fn with_references(mut self, references: EventReferences) -> Self {
        self.references = references;
        self
    }
}

/// A single row from the `event_log` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Position in the log. Strictly increasing, assigned at append.
    pub sequence: i64,
    /// Kind of actor that caused the event.
    #[serde(rename = "initiatorType")]
    pub initiator_type: String,
    /// Identifier of that actor.
    #[serde(rename = "initiatorId")]
    pub initiator_id: String,
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Structured payload.
    pub payload: serde_json::Value,
    /// Related entity identifiers.
    #[serde(flatten)]
    pub references: EventReferences,
    /// ISO 8601 creation timestamp.
    #[serde(rename = "createdAt")]
    pub created_at: String,
    /// ISO 8601 update timestamp.
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

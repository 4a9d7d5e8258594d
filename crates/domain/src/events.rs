//! Event envelope codec
//!
//! Domain events travel over the durable channel as schema-versioned payload
//! bytes. The envelope carries an `event_type` discriminator plus the subject
//! fields; unknown fields are ignored on decode so newer producers can add
//! fields without breaking older consumers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Topic carrying deferred provisioning requests
pub const PROVISIONING_TOPIC: &str = "provisioning-requests";

/// Topic carrying record-created notifications
pub const RECORD_CREATED_TOPIC: &str = "record-created";

/// Current envelope schema version
pub const ENVELOPE_SCHEMA_VERSION: u16 = 1;

/// Errors produced by the envelope codec
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to encode event: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode event: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Event discriminator carried in every envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "REQUESTED")]
    Requested,
    #[serde(rename = "CREATED")]
    Created,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Requested => write!(f, "REQUESTED"),
            EventType::Created => write!(f, "CREATED"),
        }
    }
}

/// Wire representation of a domain event.
///
/// Immutable once constructed; use the named constructors below rather than
/// building the struct directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,
    pub event_type: EventType,
    pub subject_id: String,
    pub name: String,
    pub contact: String,
}

fn default_schema_version() -> u16 {
    ENVELOPE_SCHEMA_VERSION
}

impl EventEnvelope {
    /// A provisioning request, produced by the fallback path
    pub fn provisioning_request(subject_id: &str, name: &str, contact: &str) -> Self {
        Self::new(EventType::Requested, subject_id, name, contact)
    }

    /// A record-created notification, produced once per successful write
    pub fn record_created(subject_id: &str, name: &str, contact: &str) -> Self {
        Self::new(EventType::Created, subject_id, name, contact)
    }

    fn new(event_type: EventType, subject_id: &str, name: &str, contact: &str) -> Self {
        Self {
            schema_version: ENVELOPE_SCHEMA_VERSION,
            event_type,
            subject_id: subject_id.to_string(),
            name: name.to_string(),
            contact: contact.to_string(),
        }
    }

    /// Serialize the envelope to payload bytes
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(CodecError::Encode)
    }

    /// Deserialize an envelope from payload bytes.
    ///
    /// A failure here is the consumer-side poison-message signal.
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(payload).map_err(CodecError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        let envelope = EventEnvelope::provisioning_request("cust-1", "Alice", "alice@example.com");
        let bytes = envelope.encode().unwrap();
        let decoded = EventEnvelope::decode(&bytes).unwrap();

        assert_eq!(decoded, envelope);
        assert_eq!(decoded.event_type, EventType::Requested);
        assert_eq!(decoded.schema_version, ENVELOPE_SCHEMA_VERSION);
    }

    #[test]
    fn test_record_created_discriminator() {
        let envelope = EventEnvelope::record_created("cust-2", "Bob", "bob@example.com");
        assert_eq!(envelope.event_type, EventType::Created);

        let json: serde_json::Value =
            serde_json::from_slice(&envelope.encode().unwrap()).unwrap();
        assert_eq!(json["event_type"], "CREATED");
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        // A newer producer may add fields; decoding must not reject them.
        let payload = br#"{
            "schema_version": 2,
            "event_type": "REQUESTED",
            "subject_id": "cust-3",
            "name": "Carol",
            "contact": "carol@example.com",
            "region": "eu-west-1"
        }"#;

        let decoded = EventEnvelope::decode(payload).unwrap();
        assert_eq!(decoded.subject_id, "cust-3");
        assert_eq!(decoded.schema_version, 2);
    }

    #[test]
    fn test_decode_defaults_missing_schema_version() {
        let payload = br#"{
            "event_type": "CREATED",
            "subject_id": "cust-4",
            "name": "Dan",
            "contact": "dan@example.com"
        }"#;

        let decoded = EventEnvelope::decode(payload).unwrap();
        assert_eq!(decoded.schema_version, ENVELOPE_SCHEMA_VERSION);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(EventEnvelope::decode(b"not json at all").is_err());
        assert!(EventEnvelope::decode(br#"{"event_type": "UNKNOWN"}"#).is_err());
    }
}

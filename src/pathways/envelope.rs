//! Transformer delivery envelopes.
//!
//! Each webhook delivery wraps one committed event:
//!
//! ```json
//! {
//!   "eventId": "7b0e...",
//!   "flowType": "visitor.v0",
//!   "eventType": "visitor.tracked.v0",
//!   "validTime": "2024-01-01T12:00:00.000Z",
//!   "payload": { ... }
//! }
//! ```
//!
//! Additional platform fields (`aggregator`, `dataCore`, `createdAt`,
//! `metadata`, ...) are accepted and ignored.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{EventId, FlowIdentifier};

/// The delivery body is not a usable envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid event envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid event envelope: eventId must not be empty")]
    EmptyEventId,
}

/// One event as delivered by the platform, payload still untyped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_id: EventId,
    pub flow_type: String,
    pub event_type: String,
    pub valid_time: String,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Parses a raw delivery body.
    pub fn parse(body: &[u8]) -> Result<Self, EnvelopeError> {
        let envelope: EventEnvelope = serde_json::from_slice(body)?;
        if envelope.event_id.as_str().is_empty() {
            return Err(EnvelopeError::EmptyEventId);
        }
        Ok(envelope)
    }

    /// The stream this event was committed to.
    pub fn flow(&self) -> FlowIdentifier {
        FlowIdentifier::new(&self.flow_type, &self.event_type)
    }
}

/// An event whose payload passed its contract, as handed to a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredEvent<C> {
    pub event_id: EventId,
    pub flow: FlowIdentifier,
    pub valid_time: String,
    pub payload: C,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn parses_platform_delivery() {
        let envelope = EventEnvelope::parse(&body(json!({
            "eventId": "evt-1",
            "aggregator": "visitor",
            "dataCore": "flow-analytics",
            "flowType": "visitor.v0",
            "eventType": "visitor.tracked.v0",
            "validTime": "2024-01-01T12:00:00.000Z",
            "metadata": {},
            "payload": {"pathname": "/"}
        })))
        .unwrap();

        assert_eq!(envelope.event_id, EventId::new("evt-1"));
        assert_eq!(
            envelope.flow(),
            FlowIdentifier::new("visitor.v0", "visitor.tracked.v0")
        );
        assert_eq!(envelope.payload["pathname"], "/");
    }

    #[test]
    fn rejects_missing_fields() {
        let result = EventEnvelope::parse(&body(json!({
            "eventId": "evt-1",
            "flowType": "visitor.v0",
            "payload": {}
        })));
        assert!(matches!(result, Err(EnvelopeError::Json(_))));
    }

    #[test]
    fn rejects_empty_event_id() {
        let result = EventEnvelope::parse(&body(json!({
            "eventId": "",
            "flowType": "visitor.v0",
            "eventType": "visitor.tracked.v0",
            "validTime": "2024-01-01T12:00:00.000Z",
            "payload": {}
        })));
        assert!(matches!(result, Err(EnvelopeError::EmptyEventId)));
    }

    #[test]
    fn rejects_non_json() {
        assert!(EventEnvelope::parse(b"OK").is_err());
    }
}

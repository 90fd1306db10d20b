//! Newtype wrappers for pathway identifiers.
//!
//! These types keep event ids, flow types and event types from being mixed
//! up, and make the route table keys self-describing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The platform-assigned identifier of one committed event.
///
/// Redeliveries of the same event carry the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    pub fn new(s: impl Into<String>) -> Self {
        EventId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Names a logical event stream: a flow type plus an event type within it.
///
/// Writer and reader sides address the same stream with the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowIdentifier {
    pub flow_type: String,
    pub event_type: String,
}

impl FlowIdentifier {
    pub fn new(flow_type: impl Into<String>, event_type: impl Into<String>) -> Self {
        FlowIdentifier {
            flow_type: flow_type.into(),
            event_type: event_type.into(),
        }
    }
}

impl fmt::Display for FlowIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.flow_type, self.event_type)
    }
}

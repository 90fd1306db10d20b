//! Event contracts.
//!
//! A contract binds a Rust payload type to the flow it travels on and to the
//! checks a payload must pass beyond deserialization. The same contract is
//! used by the writer (before submission) and by the transformer router
//! (before dispatch), so both sides agree on what a valid event is.
//!
//! Contracts are versioned by their flow and event type. Changing which
//! fields are required means a new version (`visitor.v1`), never an edit to an
//! existing one.

pub mod visitor_v0;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::types::FlowIdentifier;

pub use visitor_v0::{
    DEFAULT_EVENT_NAME, InputValidationError, PageviewInput, SessionContext, VisitorTrackedEvent,
};

/// A payload failed its contract.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("payload does not match {flow}: {}", .reasons.join(", "))]
pub struct SchemaError {
    pub flow: FlowIdentifier,
    pub reasons: Vec<String>,
}

impl SchemaError {
    pub fn new(flow: FlowIdentifier, reasons: Vec<String>) -> Self {
        SchemaError { flow, reasons }
    }
}

/// A typed, versioned event payload.
pub trait Contract: Serialize + DeserializeOwned + Send + Sync + 'static {
    const FLOW_TYPE: &'static str;
    const EVENT_TYPE: &'static str;

    /// The stream this payload is written to and delivered from.
    fn flow() -> FlowIdentifier {
        FlowIdentifier::new(Self::FLOW_TYPE, Self::EVENT_TYPE)
    }

    /// Returns every rule the payload breaks. Empty means valid.
    fn violations(&self) -> Vec<String> {
        Vec::new()
    }

    fn validate(&self) -> Result<(), SchemaError> {
        let reasons = self.violations();
        if reasons.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::new(Self::flow(), reasons))
        }
    }

    /// Deserializes and validates an untyped payload.
    fn from_payload(payload: &serde_json::Value) -> Result<Self, SchemaError> {
        let parsed = serde_json::from_value::<Self>(payload.clone())
            .map_err(|e| SchemaError::new(Self::flow(), vec![e.to_string()]))?;
        parsed.validate()?;
        Ok(parsed)
    }
}

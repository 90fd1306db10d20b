//! Event pathways to and from the external event log.
//!
//! This module provides:
//! - The outbound writer capability and its Flowcore HTTP transport
//! - Authentication of transformer deliveries (shared secret)
//! - The transformer router: route table, payload validation, dispatch
//! - Processed-event tracking so redeliveries are acknowledged idempotently

pub mod auth;
pub mod client;
pub mod dedupe;
pub mod envelope;
pub mod router;
pub mod state;
pub mod writer;

pub use auth::{HEADER_SECRET, TransformerSecret, verify_secret};
pub use client::{ClientBuildError, FlowcoreWebhookClient};
pub use dedupe::{DEFAULT_SEEN_TTL_HOURS, SeenEvents};
pub use envelope::{DeliveredEvent, EnvelopeError, EventEnvelope};
pub use router::{
    BuilderError, DeliveryOutcome, EventHandler, HandlerError, PathwayRouter, PathwaysBuilder,
    RouterError,
};
pub use state::{Claim, InMemoryPathwayState, PathwayState};
pub use writer::{DeliveryError, DeliveryErrorKind, EventWriter, MemoryWriter, submit_event};

//! The inbound pathway: routing transformer deliveries to handlers.
//!
//! Each delivery goes through these steps, stopping at the first failure:
//!
//! 1. **Authenticate**: `X-Secret` must equal the transformer secret
//! 2. **Parse** the envelope
//! 3. **Route**: find the handler registered for `(flowType, eventType)`
//! 4. **Claim** the event id: skip if already processed, refuse if another
//!    delivery of it is being handled right now
//! 5. **Validate** the payload against the route's contract
//! 6. **Dispatch** to the handler exactly once
//! 7. **Record** the event id as processed
//!
//! A failure at any step releases the claim and leaves no record, so the
//! platform's redelivery of the same event id goes through every step again.
//!
//! The route table is built once by [`PathwaysBuilder`] and never changes
//! afterwards; it is shared between requests without locking.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::auth::TransformerSecret;
use super::envelope::{DeliveredEvent, EnvelopeError, EventEnvelope};
use super::state::{Claim, InMemoryPathwayState, PathwayState};
use crate::clock::{Clock, SystemClock};
use crate::contract::{Contract, SchemaError};
use crate::types::{EventId, FlowIdentifier};

/// A handler failed while processing an event.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        HandlerError {
            message: message.into(),
        }
    }
}

/// Processes delivered events of one contract.
///
/// The platform delivers at least once. A handler may be invoked again for
/// an event id it has already seen (after a restart, or when a previous
/// attempt failed), so any side effect must be idempotent per event id.
pub trait EventHandler<C: Contract>: Send + Sync + 'static {
    fn handle(&self, event: &DeliveredEvent<C>) -> Result<(), HandlerError>;
}

impl<C, F> EventHandler<C> for F
where
    C: Contract,
    F: Fn(&DeliveredEvent<C>) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    fn handle(&self, event: &DeliveredEvent<C>) -> Result<(), HandlerError> {
        self(event)
    }
}

/// Errors that can occur while processing a transformer delivery.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Missing or wrong transformer secret.
    #[error("invalid transformer secret")]
    Authentication,

    /// The body is not a valid envelope.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// No handler is registered for the event's flow.
    #[error("no handler registered for {0}")]
    UnregisteredRoute(FlowIdentifier),

    /// Another delivery of the same event is still being handled.
    #[error("event {0} is already being processed")]
    InFlight(EventId),

    /// The payload does not match the registered contract.
    #[error(transparent)]
    SchemaValidation(#[from] SchemaError),

    /// The handler failed; the platform should redeliver.
    #[error("handler for event {event_id} failed: {source}")]
    Handler {
        event_id: EventId,
        #[source]
        source: HandlerError,
    },
}

/// Errors that can occur while building the route table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuilderError {
    #[error("a handler is already registered for {0}")]
    DuplicateRoute(FlowIdentifier),
}

/// What happened to an accepted delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The handler ran and succeeded.
    Processed,

    /// The event id was already processed; the handler did not run.
    AlreadyProcessed,
}

/// A type-erased route: validates a payload and invokes its handler.
trait Route: Send + Sync {
    fn dispatch(&self, envelope: &EventEnvelope) -> Result<(), RouterError>;
}

struct TypedRoute<C, H> {
    handler: H,
    _contract: PhantomData<fn() -> C>,
}

impl<C, H> Route for TypedRoute<C, H>
where
    C: Contract,
    H: EventHandler<C>,
{
    fn dispatch(&self, envelope: &EventEnvelope) -> Result<(), RouterError> {
        let payload = C::from_payload(&envelope.payload)?;
        let event = DeliveredEvent {
            event_id: envelope.event_id.clone(),
            flow: C::flow(),
            valid_time: envelope.valid_time.clone(),
            payload,
        };
        self.handler
            .handle(&event)
            .map_err(|source| RouterError::Handler {
                event_id: envelope.event_id.clone(),
                source,
            })
    }
}

/// Collects routes before the router is frozen.
pub struct PathwaysBuilder {
    routes: HashMap<FlowIdentifier, Box<dyn Route>>,
    state: Arc<dyn PathwayState>,
    clock: Arc<dyn Clock>,
}

impl Default for PathwaysBuilder {
    fn default() -> Self {
        PathwaysBuilder {
            routes: HashMap::new(),
            state: Arc::new(InMemoryPathwayState::new()),
            clock: Arc::new(SystemClock),
        }
    }
}

impl PathwaysBuilder {
    /// Creates a builder with in-memory state and the system clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the clock used to timestamp processed events.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the default in-memory pathway state.
    pub fn with_state(mut self, state: Arc<dyn PathwayState>) -> Self {
        self.state = state;
        self
    }

    /// Registers `handler` for the contract `C`'s flow.
    pub fn register<C, H>(mut self, handler: H) -> Result<Self, BuilderError>
    where
        C: Contract,
        H: EventHandler<C>,
    {
        let flow = C::flow();
        if self.routes.contains_key(&flow) {
            return Err(BuilderError::DuplicateRoute(flow));
        }
        let route = TypedRoute {
            handler,
            _contract: PhantomData::<fn() -> C>,
        };
        self.routes.insert(flow, Box::new(route));
        Ok(self)
    }

    /// Freezes the route table.
    pub fn build(self, secret: TransformerSecret) -> PathwayRouter {
        PathwayRouter {
            routes: self.routes,
            state: self.state,
            clock: self.clock,
            secret,
        }
    }
}

/// Authenticates, validates and dispatches transformer deliveries.
pub struct PathwayRouter {
    routes: HashMap<FlowIdentifier, Box<dyn Route>>,
    state: Arc<dyn PathwayState>,
    clock: Arc<dyn Clock>,
    secret: TransformerSecret,
}

impl PathwayRouter {
    /// Processes one raw delivery body presented with `provided_secret`.
    ///
    /// Runs synchronously to completion; nothing is queued.
    pub fn process_event(
        &self,
        body: &[u8],
        provided_secret: &str,
    ) -> Result<DeliveryOutcome, RouterError> {
        if !self.secret.verify(provided_secret) {
            warn!("Transformer delivery with invalid secret");
            return Err(RouterError::Authentication);
        }

        let envelope = EventEnvelope::parse(body)?;
        let flow = envelope.flow();
        let event_id = &envelope.event_id;

        debug!(event_id = %event_id, flow = %flow, "Received transformer delivery");

        let Some(route) = self.routes.get(&flow) else {
            error!(event_id = %event_id, flow = %flow, "No handler registered for flow");
            return Err(RouterError::UnregisteredRoute(flow));
        };

        match self.state.try_begin(event_id, self.clock.now()) {
            Claim::Claimed => {}
            Claim::Done => {
                info!(event_id = %event_id, flow = %flow, "Event already processed (idempotent)");
                return Ok(DeliveryOutcome::AlreadyProcessed);
            }
            Claim::InFlight => {
                warn!(event_id = %event_id, flow = %flow, "Event is already being processed");
                return Err(RouterError::InFlight(event_id.clone()));
            }
        }

        if let Err(e) = route.dispatch(&envelope) {
            self.state.release(event_id);
            warn!(event_id = %event_id, flow = %flow, error = %e, "Transformer delivery failed");
            return Err(e);
        }

        self.state.complete(event_id, self.clock.now());
        debug!(event_id = %event_id, flow = %flow, "Event processed");
        Ok(DeliveryOutcome::Processed)
    }

    /// The flows with a registered handler.
    pub fn registered_flows(&self) -> impl Iterator<Item = &FlowIdentifier> {
        self.routes.keys()
    }

    /// Number of event ids currently recorded as processed.
    pub fn processed_count(&self) -> usize {
        self.state.processed_count()
    }
}

impl std::fmt::Debug for PathwayRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathwayRouter")
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

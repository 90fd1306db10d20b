//! Collection of browser analytics events.
//!
//! A collection request is validated, reduced to a day-scoped visitor hash,
//! turned into a `visitor.tracked.v0` event and written to the external log.
//! The raw client address and user agent go into the hash and nowhere else.

use std::sync::Arc;

use axum::http::HeaderMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::contract::{InputValidationError, PageviewInput, VisitorTrackedEvent};
use crate::pathways::{DeliveryError, EventWriter, submit_event};
use crate::privacy::{SaltClock, resolve_client_ip, resolve_user_agent};

/// Errors that can occur when collecting an event.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The request body failed validation.
    #[error(transparent)]
    InvalidInput(#[from] InputValidationError),

    /// The external log did not accept the event.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Turns collection requests into events on the external log.
pub struct AnalyticsService<W> {
    salt_clock: SaltClock,
    writer: W,
    clock: Arc<dyn Clock>,
}

impl<W: EventWriter> AnalyticsService<W> {
    /// Creates a service that hashes with `salt_clock`, writes through
    /// `writer` and reads the date from `clock`.
    pub fn new(salt_clock: SaltClock, writer: W, clock: Arc<dyn Clock>) -> Self {
        AnalyticsService {
            salt_clock,
            writer,
            clock,
        }
    }

    /// Validates `body`, derives the visitor hash from `headers` and writes
    /// the resulting event. Returns the event that was written.
    ///
    /// One submission attempt is made; a failure is returned, not retried.
    pub async fn process_pageview(
        &self,
        body: &[u8],
        headers: &HeaderMap,
    ) -> Result<VisitorTrackedEvent, CollectError> {
        let input = PageviewInput::parse(body)?;

        let today = self.clock.now().date_naive();
        let visitor_hash = {
            let ip = resolve_client_ip(headers);
            let user_agent = resolve_user_agent(headers);
            self.salt_clock.visitor_hash(&ip, &user_agent, today)
        };

        let event = VisitorTrackedEvent::new(visitor_hash, input, today);

        if let Err(e) = submit_event(&self.writer, &event).await {
            warn!(pathname = %event.pathname, error = %e, "Failed to write analytics event");
            return Err(e.into());
        }

        info!(
            pathname = %event.pathname,
            event = %event.event_name(),
            visitor = %event.visitor_hash.prefix(),
            "Analytics event processed"
        );
        Ok(event)
    }

    /// The salt clock used for visitor hashes and rotation reporting.
    pub fn salt_clock(&self) -> &SaltClock {
        &self.salt_clock
    }
}

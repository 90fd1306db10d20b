//! Pathway state: which delivered events have been fully handled.
//!
//! The router consults this before dispatch so that a redelivery of an event
//! whose handler already succeeded is acknowledged without running the
//! handler again. Events are recorded only after their handler succeeds;
//! a failed handler leaves no trace, so the platform's retry runs it again.
//! While a handler runs, its event id is held as in flight so that a
//! concurrent redelivery cannot dispatch the same event a second time.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};

use super::dedupe::SeenEvents;
use crate::types::EventId;

/// Result of trying to start work on an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The caller now owns the event and must `complete` or `release` it.
    Claimed,

    /// Another delivery of the same event is being handled right now.
    InFlight,

    /// The event was already handled successfully.
    Done,
}

/// Storage for processed and in-flight event ids.
///
/// `try_begin` is atomic: of any number of concurrent callers with the same
/// id, at most one gets [`Claim::Claimed`].
pub trait PathwayState: Send + Sync {
    /// Claims `event_id` for processing unless it is in flight or done.
    fn try_begin(&self, event_id: &EventId, now: DateTime<Utc>) -> Claim;

    /// Marks a claimed `event_id` as processed and drops the claim.
    fn complete(&self, event_id: &EventId, now: DateTime<Utc>);

    /// Drops a claim without recording the event, so it can be retried.
    fn release(&self, event_id: &EventId);

    /// Number of processed ids currently retained.
    fn processed_count(&self) -> usize;
}

/// Process-local pathway state with TTL-based expiry.
///
/// State is lost on restart; a redelivery after a restart runs the handler
/// again, which handlers tolerate by being idempotent.
#[derive(Debug, Default)]
pub struct InMemoryPathwayState {
    inner: Mutex<StateInner>,
}

#[derive(Debug, Default)]
struct StateInner {
    processed: SeenEvents,
    in_flight: HashSet<EventId>,
}

impl InMemoryPathwayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates state that forgets processed ids after `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        InMemoryPathwayState {
            inner: Mutex::new(StateInner {
                processed: SeenEvents::with_ttl(ttl),
                in_flight: HashSet::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StateInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PathwayState for InMemoryPathwayState {
    fn try_begin(&self, event_id: &EventId, now: DateTime<Utc>) -> Claim {
        let mut inner = self.lock();
        if inner.processed.contains(event_id, now) {
            return Claim::Done;
        }
        if !inner.in_flight.insert(event_id.clone()) {
            return Claim::InFlight;
        }
        Claim::Claimed
    }

    fn complete(&self, event_id: &EventId, now: DateTime<Utc>) {
        let mut inner = self.lock();
        inner.in_flight.remove(event_id);
        inner.processed.insert(event_id, now);
    }

    fn release(&self, event_id: &EventId) {
        self.lock().in_flight.remove(event_id);
    }

    fn processed_count(&self) -> usize {
        self.lock().processed.len()
    }
}

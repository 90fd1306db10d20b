//! Time-bounded record of event ids that have already been handled.
//!
//! The platform may redeliver the same event id after a failure or an
//! ambiguous network outcome. Seen ids are kept with the time they were
//! recorded; ids older than the retention period (default 24 hours) are
//! pruned so the set does not grow without bound.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::types::EventId;

/// Default retention for seen event ids (24 hours).
pub const DEFAULT_SEEN_TTL_HOURS: i64 = 24;

/// Minimum spacing between automatic prunes.
const PRUNE_INTERVAL_MINUTES: i64 = 10;

/// Event ids seen within the retention window.
#[derive(Debug, Clone)]
pub struct SeenEvents {
    seen: HashMap<EventId, DateTime<Utc>>,
    ttl: Duration,
    last_pruned: Option<DateTime<Utc>>,
}

impl Default for SeenEvents {
    fn default() -> Self {
        SeenEvents::with_ttl(Duration::hours(DEFAULT_SEEN_TTL_HOURS))
    }
}

impl SeenEvents {
    /// Creates an empty set that forgets ids after `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        SeenEvents {
            seen: HashMap::new(),
            ttl,
            last_pruned: None,
        }
    }

    /// Returns `true` if `id` was recorded and has not expired at `now`.
    pub fn contains(&self, id: &EventId, now: DateTime<Utc>) -> bool {
        self.seen
            .get(id)
            .is_some_and(|recorded| *recorded > now - self.ttl)
    }

    /// Records `id` as seen at `now`.
    ///
    /// Returns `false` if the id was already present and unexpired.
    pub fn insert(&mut self, id: &EventId, now: DateTime<Utc>) -> bool {
        self.maybe_prune(now);
        let fresh = !self.contains(id, now);
        if fresh {
            self.seen.insert(id.clone(), now);
        }
        fresh
    }

    /// Drops ids older than the retention period. Returns how many were dropped.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.ttl;
        let before_len = self.seen.len();
        self.seen.retain(|_, recorded| *recorded > cutoff);
        self.last_pruned = Some(now);
        before_len - self.seen.len()
    }

    /// Number of ids held, including expired ones not yet pruned.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn maybe_prune(&mut self, now: DateTime<Utc>) {
        let due = match self.last_pruned {
            Some(at) => now - at >= Duration::minutes(PRUNE_INTERVAL_MINUTES),
            None => true,
        };
        if due {
            self.prune_expired(now);
        }
    }
}

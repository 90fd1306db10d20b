//! Handler for `visitor.tracked.v0` deliveries.
//!
//! Runs after the platform has durably committed an event. It only observes:
//! structured log lines and in-memory counters. It never writes back to the
//! log and never sees raw personal data, only the day-scoped hash prefix.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::clock::Clock;
use crate::contract::{DEFAULT_EVENT_NAME, VisitorTrackedEvent};
use crate::pathways::{DeliveredEvent, EventHandler, HandlerError, SeenEvents};
use crate::types::EventId;

/// Non-personal facts derived from one tracked event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsInsights {
    pub is_page_view: bool,
    pub is_custom_event: bool,
    pub has_referrer: bool,
    pub salt_rotation_date: String,
    pub event_name: String,
}

impl AnalyticsInsights {
    pub fn from_event(event: &VisitorTrackedEvent) -> Self {
        let event_name = event.event_name().to_string();
        let is_page_view = event_name == DEFAULT_EVENT_NAME;
        AnalyticsInsights {
            is_page_view,
            is_custom_event: !is_page_view,
            has_referrer: !event.referrer.is_empty(),
            salt_rotation_date: event.session_context.daily_salt_rotation.clone(),
            event_name,
        }
    }
}

/// Counters over handled events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub events_total: u64,
    pub page_views: u64,
    pub custom_events: u64,
    pub with_referrer: u64,
}

/// Event counters that count each event id at most once within the
/// retention window.
#[derive(Debug, Default)]
pub struct VisitorMetrics {
    inner: Mutex<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    counted: SeenEvents,
    totals: MetricsSnapshot,
}

impl VisitorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one event seen at `now`. Returns `false` if `event_id` was
    /// already counted within the retention window.
    pub fn record(
        &self,
        event_id: &EventId,
        insights: &AnalyticsInsights,
        now: DateTime<Utc>,
    ) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if !inner.counted.insert(event_id, now) {
            return false;
        }

        let totals = &mut inner.totals;
        totals.events_total += 1;
        if insights.is_page_view {
            totals.page_views += 1;
        } else {
            totals.custom_events += 1;
        }
        if insights.has_referrer {
            totals.with_referrer += 1;
        }
        true
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .totals
    }
}

/// Logs and counts committed visitor events.
#[derive(Clone)]
pub struct VisitorTrackedHandler {
    metrics: Arc<VisitorMetrics>,
    clock: Arc<dyn Clock>,
}

impl VisitorTrackedHandler {
    /// Creates a handler recording into `metrics`, timestamped by `clock`.
    pub fn new(metrics: Arc<VisitorMetrics>, clock: Arc<dyn Clock>) -> Self {
        VisitorTrackedHandler { metrics, clock }
    }
}

impl EventHandler<VisitorTrackedEvent> for VisitorTrackedHandler {
    fn handle(&self, event: &DeliveredEvent<VisitorTrackedEvent>) -> Result<(), HandlerError> {
        let payload = &event.payload;
        let insights = AnalyticsInsights::from_event(payload);

        info!(
            event_id = %event.event_id,
            flow = %event.flow,
            valid_time = %event.valid_time,
            page = %payload.pathname,
            referrer = %payload.referrer_or_direct(),
            event = %insights.event_name,
            visitor = %payload.visitor_hash.prefix(),
            "Visitor tracked"
        );

        let counted = self.metrics.record(&event.event_id, &insights, self.clock.now());
        if !counted {
            info!(event_id = %event.event_id, "Visitor event already counted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::contract::{Contract, SessionContext};
    use crate::privacy::VisitorHash;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn new_handler(metrics: &Arc<VisitorMetrics>) -> VisitorTrackedHandler {
        VisitorTrackedHandler::new(metrics.clone(), Arc::new(FixedClock(t0())))
    }

    fn event(referrer: &str, event_name: Option<&str>) -> VisitorTrackedEvent {
        VisitorTrackedEvent {
            visitor_hash: VisitorHash::parse("e".repeat(64)).unwrap(),
            pathname: "/blog".to_string(),
            referrer: referrer.to_string(),
            event_name: event_name.map(str::to_string),
            session_context: SessionContext {
                daily_salt_rotation: "2024-01-01".to_string(),
            },
        }
    }

    fn delivered(id: &str, payload: VisitorTrackedEvent) -> DeliveredEvent<VisitorTrackedEvent> {
        DeliveredEvent {
            event_id: EventId::new(id),
            flow: VisitorTrackedEvent::flow(),
            valid_time: "2024-01-01T12:00:00.000Z".to_string(),
            payload,
        }
    }

    #[test]
    fn insights_for_direct_page_view() {
        let insights = AnalyticsInsights::from_event(&event("", None));
        assert_eq!(
            insights,
            AnalyticsInsights {
                is_page_view: true,
                is_custom_event: false,
                has_referrer: false,
                salt_rotation_date: "2024-01-01".to_string(),
                event_name: "page_view".to_string(),
            }
        );
    }

    #[test]
    fn insights_for_referred_custom_event() {
        let insights = AnalyticsInsights::from_event(&event("https://a.example/", Some("signup")));
        assert!(insights.is_custom_event);
        assert!(!insights.is_page_view);
        assert!(insights.has_referrer);
        assert_eq!(insights.event_name, "signup");
    }

    #[test]
    fn explicit_page_view_name_is_a_page_view() {
        let insights = AnalyticsInsights::from_event(&event("", Some("page_view")));
        assert!(insights.is_page_view);
    }

    #[test]
    fn handler_counts_events() {
        let metrics = Arc::new(VisitorMetrics::new());
        let handler = new_handler(&metrics);

        handler.handle(&delivered("evt-1", event("", None))).unwrap();
        handler
            .handle(&delivered("evt-2", event("https://r.example/", Some("cta"))))
            .unwrap();

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                events_total: 2,
                page_views: 1,
                custom_events: 1,
                with_referrer: 1,
            }
        );
    }

    #[test]
    fn handler_is_idempotent_per_event_id() {
        let metrics = Arc::new(VisitorMetrics::new());
        let handler = new_handler(&metrics);
        let ev = delivered("evt-1", event("", None));

        handler.handle(&ev).unwrap();
        let after_one = metrics.snapshot();
        handler.handle(&ev).unwrap();

        assert_eq!(metrics.snapshot(), after_one);
        assert_eq!(after_one.events_total, 1);
    }

    #[test]
    fn counted_ids_expire_after_retention() {
        let metrics = VisitorMetrics::new();
        let id = EventId::new("evt-1");
        let insights = AnalyticsInsights::from_event(&event("", None));

        assert!(metrics.record(&id, &insights, t0()));
        assert!(!metrics.record(&id, &insights, t0() + Duration::hours(23)));
        assert!(metrics.record(&id, &insights, t0() + Duration::hours(25)));
        assert_eq!(metrics.snapshot().events_total, 2);
    }
}

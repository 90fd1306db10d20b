//! Handlers for committed events delivered back by the platform.

pub mod visitor_tracked;

use std::sync::Arc;

use crate::clock::Clock;
use crate::contract::VisitorTrackedEvent;
use crate::pathways::{BuilderError, PathwayRouter, PathwaysBuilder, TransformerSecret};

pub use visitor_tracked::{
    AnalyticsInsights, MetricsSnapshot, VisitorMetrics, VisitorTrackedHandler,
};

/// Builds the transformer router with every handler this service runs.
///
/// `clock` timestamps both the router's processed-event record and the
/// handler counters.
pub fn build_pathways(
    secret: TransformerSecret,
    metrics: Arc<VisitorMetrics>,
    clock: Arc<dyn Clock>,
) -> Result<PathwayRouter, BuilderError> {
    let handler = VisitorTrackedHandler::new(metrics, clock.clone());
    let router = PathwaysBuilder::new()
        .with_clock(clock)
        .register::<VisitorTrackedEvent, _>(handler)?
        .build(secret);
    Ok(router)
}

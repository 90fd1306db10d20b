//! HTTP server for the analytics collector.
//!
//! This module implements the HTTP server that:
//! - Accepts analytics events from browsers and writes them to the event log
//! - Accepts transformer deliveries from the platform and dispatches them
//! - Provides health, salt rotation and counter endpoints
//!
//! # Endpoints
//!
//! Every route except `/` is served both at the root and under `/api`.
//!
//! - `GET /` - Service information
//! - `POST /pageview`, `POST /event` - Collects an event (204 No Content)
//! - `POST /transformer` - Receives a platform delivery (200 OK)
//! - `GET /health`, `GET /healthz` - Health and salt rotation status
//! - `GET /metrics` - Handler counters

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use chrono::{DateTime, Utc};

pub mod health;
pub mod pageview;
pub mod transformer;

pub use health::{health_handler, metrics_handler, service_info_handler};
pub use pageview::pageview_handler;
pub use transformer::transformer_handler;

use crate::clock::Clock;
use crate::collect::AnalyticsService;
use crate::handlers::VisitorMetrics;
use crate::pathways::{EventWriter, PathwayRouter};

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor. Everything
/// in it is either immutable or guards its own interior state.
pub struct AppState<W> {
    inner: Arc<AppStateInner<W>>,
}

struct AppStateInner<W> {
    analytics: AnalyticsService<W>,
    pathways: PathwayRouter,
    metrics: Arc<VisitorMetrics>,
    clock: Arc<dyn Clock>,
    started_at: DateTime<Utc>,
}

impl<W> Clone for AppState<W> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: EventWriter> AppState<W> {
    /// `metrics` must be the same counters the pathway handlers record into.
    pub fn new(
        analytics: AnalyticsService<W>,
        pathways: PathwayRouter,
        metrics: Arc<VisitorMetrics>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let started_at = clock.now();
        AppState {
            inner: Arc::new(AppStateInner {
                analytics,
                pathways,
                metrics,
                clock,
                started_at,
            }),
        }
    }

    /// The collection service.
    pub fn analytics(&self) -> &AnalyticsService<W> {
        &self.inner.analytics
    }

    /// The transformer router.
    pub fn pathways(&self) -> &PathwayRouter {
        &self.inner.pathways
    }

    pub fn metrics(&self) -> &VisitorMetrics {
        &self.inner.metrics
    }

    /// Current time from the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// When this state was built, used for uptime.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<W: EventWriter>(app_state: AppState<W>) -> Router {
    let routes = Router::new()
        .route("/pageview", post(pageview_handler::<W>))
        .route("/event", post(pageview_handler::<W>))
        .route("/transformer", post(transformer_handler::<W>))
        .route("/health", get(health_handler::<W>))
        .route("/healthz", get(health_handler::<W>))
        .route("/metrics", get(metrics_handler::<W>));

    Router::new()
        .route("/", get(service_info_handler))
        .merge(routes.clone())
        .nest("/api", routes)
        .with_state(app_state)
}

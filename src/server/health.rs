//! Service information, health and counter endpoints.
//!
//! `/health` is intended for load balancers and orchestration liveness
//! probes; it also reports the salt rotation schedule so operators can see
//! which salt is in force without learning the salt itself.

use axum::Json;
use axum::extract::State;
use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::{Value, json};

use super::AppState;
use crate::handlers::MetricsSnapshot;
use crate::pathways::EventWriter;
use crate::privacy::RotationInfo;

pub const SERVICE_NAME: &str = "Flowcore Analytics Collector";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime_seconds: i64,
    pub salt_rotation: RotationInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub handled: MetricsSnapshot,
    pub processed_events: usize,
}

/// Describes the service and its endpoints.
pub async fn service_info_handler() -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "metrics": "/metrics",
            "transformer": "/api/transformer",
            "pageview": "/api/pageview",
            "event": "/api/event",
        },
    }))
}

/// Health check handler.
///
/// # Example
///
/// ```ignore
/// GET /health HTTP/1.1
///
/// HTTP/1.1 200 OK
/// Content-Type: application/json
///
/// {"status":"healthy","timestamp":"2024-01-01T23:59:59.000Z","uptimeSeconds":42,
///  "saltRotation":{"currentSaltPrefix":"1a2b3c4d",
///  "nextRotationAt":"2024-01-02T00:00:00.000Z","secondsUntilRotation":1}}
/// ```
pub async fn health_handler<W: EventWriter>(
    State(app_state): State<AppState<W>>,
) -> Json<HealthResponse> {
    let now = app_state.now();
    Json(HealthResponse {
        status: "healthy",
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        uptime_seconds: (now - app_state.started_at()).num_seconds().max(0),
        salt_rotation: app_state.analytics().salt_clock().rotation_info(now),
    })
}

/// Counters of events handled since startup.
pub async fn metrics_handler<W: EventWriter>(
    State(app_state): State<AppState<W>>,
) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        handled: app_state.metrics().snapshot(),
        processed_events: app_state.pathways().processed_count(),
    })
}

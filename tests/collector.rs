//! End-to-end tests: collect an event, deliver it back through the
//! transformer endpoint, and observe the handler counters.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use analytics_collector::clock::{Clock, FixedClock};
use analytics_collector::collect::AnalyticsService;
use analytics_collector::handlers::{VisitorMetrics, build_pathways};
use analytics_collector::pathways::{MemoryWriter, TransformerSecret};
use analytics_collector::privacy::{MasterSecret, SaltClock};
use analytics_collector::server::{AppState, build_router};

const SECRET: &str = "integration-transformer-secret";

struct Harness {
    app: Router,
    writer: MemoryWriter,
}

fn harness() -> Harness {
    let writer = MemoryWriter::new();
    let clock: Arc<dyn Clock> =
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()));
    let metrics = Arc::new(VisitorMetrics::new());
    let pathways =
        build_pathways(TransformerSecret::new(SECRET), metrics.clone(), clock.clone()).unwrap();
    let master = MasterSecret::new("integration-master-secret-0123456789").unwrap();
    let salt_clock = SaltClock::new(master);
    let analytics = AnalyticsService::new(salt_clock, writer.clone(), clock.clone());

    Harness {
        app: build_router(AppState::new(analytics, pathways, metrics, clock)),
        writer,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

fn pageview(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/pageview")
        .header("content-type", "application/json")
        .header("x-forwarded-for", "192.0.2.10, 10.0.0.1")
        .header("user-agent", "IntegrationAgent/2.0")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delivery(secret: &str, event_id: &str, payload: &Value) -> Request<Body> {
    let envelope = json!({
        "eventId": event_id,
        "flowType": "visitor.v0",
        "eventType": "visitor.tracked.v0",
        "validTime": "2024-03-15T09:30:00.000Z",
        "payload": payload,
    });
    Request::builder()
        .method("POST")
        .uri("/api/transformer")
        .header("content-type", "application/json")
        .header("x-secret", secret)
        .body(Body::from(envelope.to_string()))
        .unwrap()
}

async fn metrics(app: &Router) -> Value {
    let request = Request::builder()
        .uri("/api/metrics")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn collected_event_round_trips_through_transformer() {
    let h = harness();

    let (status, body) = send(
        &h.app,
        pageview(json!({"pathname": "/docs", "referrer": "https://search.example/"})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());

    let submitted = h.writer.submitted();
    assert_eq!(submitted.len(), 1);
    let event = submitted[0].1.clone();
    assert_eq!(event["sessionContext"]["dailySaltRotation"], "2024-03-15");

    let (status, body) = send(&h.app, delivery(SECRET, "evt-100", &event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");

    let counters = metrics(&h.app).await;
    assert_eq!(counters["eventsTotal"], 1);
    assert_eq!(counters["pageViews"], 1);
    assert_eq!(counters["withReferrer"], 1);
    assert_eq!(counters["processedEvents"], 1);

    let (status, _) = send(&h.app, delivery(SECRET, "evt-100", &event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics(&h.app).await["eventsTotal"], 1);
}

#[tokio::test]
async fn wrong_secret_never_reaches_handler() {
    let h = harness();
    send(&h.app, pageview(json!({"pathname": "/"}))).await;
    let event = h.writer.submitted()[0].1.clone();

    let (status, body) = send(&h.app, delivery("guess", "evt-1", &event)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].is_string());
    let counters = metrics(&h.app).await;
    assert_eq!(counters["eventsTotal"], 0);
    assert_eq!(counters["processedEvents"], 0);
}

#[tokio::test]
async fn pageview_without_referrer_is_direct() {
    let h = harness();

    let (status, _) = send(&h.app, pageview(json!({"pathname": "/home"}))).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    let event = &h.writer.submitted()[0].1;
    assert_eq!(event["pathname"], "/home");
    assert_eq!(event["referrer"], "");
    assert!(event.get("eventName").is_none());
}

#[tokio::test]
async fn custom_event_is_counted_separately() {
    let h = harness();

    send(
        &h.app,
        pageview(json!({"pathname": "/pricing", "eventName": "signup_click"})),
    )
    .await;
    let event = h.writer.submitted()[0].1.clone();
    assert_eq!(event["eventName"], "signup_click");

    let (status, _) = send(&h.app, delivery(SECRET, "evt-2", &event)).await;
    assert_eq!(status, StatusCode::OK);

    let counters = metrics(&h.app).await;
    assert_eq!(counters["customEvents"], 1);
    assert_eq!(counters["pageViews"], 0);
}

#[tokio::test]
async fn same_visitor_same_day_gets_same_hash() {
    let h = harness();

    send(&h.app, pageview(json!({"pathname": "/a"}))).await;
    send(&h.app, pageview(json!({"pathname": "/b"}))).await;

    let submitted = h.writer.submitted();
    assert_eq!(submitted.len(), 2);
    assert_eq!(submitted[0].1["visitorHash"], submitted[1].1["visitorHash"]);
}

#[tokio::test]
async fn health_reports_rotation_for_fixed_clock() {
    let h = harness();
    let request = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::OK);
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(
        health["saltRotation"]["nextRotationAt"],
        "2024-03-16T00:00:00.000Z"
    );
    assert_eq!(health["saltRotation"]["secondsUntilRotation"], 52_200);
}

//! Collection endpoint handler.
//!
//! Accepts analytics events from the tracker script. The body is parsed by
//! the collection service rather than by an extractor so that malformed JSON
//! is reported like any other validation failure.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use super::AppState;
use crate::collect::CollectError;
use crate::pathways::EventWriter;

/// Body returned when the event log refuses an event. The cause stays in
/// the server log.
pub const DELIVERY_FAILED_MESSAGE: &str = "Failed to record event";

impl IntoResponse for CollectError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            CollectError::InvalidInput(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            CollectError::Delivery(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                DELIVERY_FAILED_MESSAGE.to_string(),
            ),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Collection handler.
///
/// # Request
///
/// - Method: POST
/// - Body: `{"pathname": "/blog", "referrer": "...", "eventName": "..."}`;
///   only `pathname` is required
///
/// # Response
///
/// - 204 No Content: event written to the log
/// - 400 Bad Request: `{"error": "Validation error: ..."}`
/// - 500 Internal Server Error: `{"error": "Failed to record event"}` when the
///   log refused the event
pub async fn pageview_handler<W: EventWriter>(
    State(app_state): State<AppState<W>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, CollectError> {
    app_state
        .analytics()
        .process_pageview(&body, &headers)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

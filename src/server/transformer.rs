//! Transformer endpoint handler.
//!
//! Receives events the platform has committed to the log and hands them to
//! the pathway router. The platform treats any non-2xx answer as a failed
//! delivery and redelivers later.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use super::AppState;
use crate::pathways::{EventWriter, HEADER_SECRET, RouterError};

impl IntoResponse for RouterError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Transformer handler.
///
/// # Request
///
/// - Method: POST
/// - Header `X-Secret`: the transformer secret; absent counts as empty
/// - Body: the delivery envelope
///
/// # Response
///
/// - 200 OK with body `OK`: processed, or already processed earlier
/// - 500 Internal Server Error: `{"error": "..."}` for any failure
pub async fn transformer_handler<W: EventWriter>(
    State(app_state): State<AppState<W>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), RouterError> {
    let secret = headers
        .get(HEADER_SECRET)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    match app_state.pathways().process_event(&body, secret) {
        Ok(_) => Ok((StatusCode::OK, "OK")),
        Err(e) => {
            error!(error = %e, "Error processing transformer delivery");
            Err(e)
        }
    }
}

//! The `visitor.v0` flow: one `visitor.tracked.v0` event per page view or
//! custom event.
//!
//! # Wire format
//!
//! ```json
//! {
//!   "visitorHash": "<64 lowercase hex>",
//!   "pathname": "/pricing",
//!   "referrer": "https://news.example.com/",
//!   "eventName": "signup_click",
//!   "sessionContext": { "dailySaltRotation": "2024-01-01" }
//! }
//! ```
//!
//! | field | required | notes |
//! |---|---|---|
//! | `visitorHash` | yes | day-scoped hash, never the raw inputs |
//! | `pathname` | yes | non-empty |
//! | `referrer` | no | defaults to `""`, meaning direct traffic |
//! | `eventName` | no | absent means `page_view` |
//! | `sessionContext.dailySaltRotation` | yes | `YYYY-MM-DD` of the salt used |
//!
//! Unknown fields are rejected.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Contract;
use crate::privacy::{VisitorHash, rotation_date};

pub const FLOW_TYPE: &str = "visitor.v0";
pub const EVENT_TYPE_VISITOR_TRACKED: &str = "visitor.tracked.v0";

/// The event name implied when `eventName` is absent.
pub const DEFAULT_EVENT_NAME: &str = "page_view";

/// Session context carried with every tracked event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SessionContext {
    /// The UTC date whose salt produced `visitorHash`.
    pub daily_salt_rotation: String,
}

/// A visitor was seen on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VisitorTrackedEvent {
    pub visitor_hash: VisitorHash,
    pub pathname: String,
    #[serde(default)]
    pub referrer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    pub session_context: SessionContext,
}

impl VisitorTrackedEvent {
    /// Builds an event from validated collection input.
    ///
    /// `salt_date` must be the date whose salt derived `visitor_hash`.
    pub fn new(visitor_hash: VisitorHash, input: PageviewInput, salt_date: NaiveDate) -> Self {
        VisitorTrackedEvent {
            visitor_hash,
            pathname: input.pathname,
            referrer: input.referrer.unwrap_or_default(),
            event_name: input.event_name,
            session_context: SessionContext {
                daily_salt_rotation: rotation_date(salt_date),
            },
        }
    }

    /// The event name, defaulting to [`DEFAULT_EVENT_NAME`].
    pub fn event_name(&self) -> &str {
        self.event_name.as_deref().unwrap_or(DEFAULT_EVENT_NAME)
    }

    /// The referrer, or `"direct"` when there was none.
    pub fn referrer_or_direct(&self) -> &str {
        if self.referrer.is_empty() {
            "direct"
        } else {
            &self.referrer
        }
    }
}

impl Contract for VisitorTrackedEvent {
    const FLOW_TYPE: &'static str = FLOW_TYPE;
    const EVENT_TYPE: &'static str = EVENT_TYPE_VISITOR_TRACKED;

    fn violations(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.pathname.is_empty() {
            reasons.push("pathname must not be empty".to_string());
        }
        if matches!(self.event_name.as_deref(), Some("")) {
            reasons.push("eventName must not be empty when present".to_string());
        }
        let rotation = &self.session_context.daily_salt_rotation;
        if NaiveDate::parse_from_str(rotation, "%Y-%m-%d").is_err() {
            reasons.push(format!(
                "sessionContext.dailySaltRotation must be YYYY-MM-DD (got {:?})",
                rotation
            ));
        }
        reasons
    }
}

/// Collection input from a browser failed validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Validation error: {}", .reasons.join(", "))]
pub struct InputValidationError {
    pub reasons: Vec<String>,
}

impl InputValidationError {
    fn single(reason: impl Into<String>) -> Self {
        InputValidationError {
            reasons: vec![reason.into()],
        }
    }
}

/// The untrusted subset a browser may send.
///
/// ```json
/// { "pathname": "/home", "referrer": "https://example.com/", "eventName": "signup" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageviewInput {
    pub pathname: String,
    pub referrer: Option<String>,
    pub event_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPageviewInput {
    #[serde(default)]
    pathname: Option<String>,
    #[serde(default)]
    referrer: Option<String>,
    #[serde(default)]
    event_name: Option<String>,
}

impl PageviewInput {
    /// Parses and validates a raw request body.
    ///
    /// Unknown fields are ignored so older tracker scripts keep working.
    pub fn parse(body: &[u8]) -> Result<Self, InputValidationError> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| InputValidationError::single(format!("body is not valid JSON: {}", e)))?;
        if !value.is_object() {
            return Err(InputValidationError::single("body must be a JSON object"));
        }
        let raw: RawPageviewInput = serde_json::from_value(value)
            .map_err(|e| InputValidationError::single(e.to_string()))?;

        let mut reasons = Vec::new();
        let pathname = raw.pathname.unwrap_or_default();
        if pathname.is_empty() {
            reasons.push("Pathname is required".to_string());
        }
        if matches!(raw.event_name.as_deref(), Some("")) {
            reasons.push("Event name must not be empty".to_string());
        }
        if !reasons.is_empty() {
            return Err(InputValidationError { reasons });
        }

        Ok(PageviewInput {
            pathname,
            referrer: raw.referrer,
            event_name: raw.event_name,
        })
    }
}

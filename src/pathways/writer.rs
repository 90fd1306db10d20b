//! The outbound pathway: appending events to the external log.
//!
//! Writers make at most one submission attempt per call. Transport-level
//! retries, if any, belong to the underlying HTTP stack; a failure surfaces
//! to the caller as a single [`DeliveryError`] and is never retried here.
//!
//! Failure kinds:
//!
//! - **Authentication**: the platform rejected our credentials (401/403)
//! - **Rejected**: the platform refused the event itself, e.g. schema (4xx)
//! - **Transport**: connection failure, 5xx, unreadable response
//! - **Timeout**: no answer within the configured bound

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::debug;

use crate::contract::Contract;
use crate::types::FlowIdentifier;

/// Why a submission failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryErrorKind {
    Authentication,
    Rejected,
    Transport,
    Timeout,
}

impl fmt::Display for DeliveryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeliveryErrorKind::Authentication => "authentication rejected",
            DeliveryErrorKind::Rejected => "event rejected",
            DeliveryErrorKind::Transport => "transport failure",
            DeliveryErrorKind::Timeout => "timed out",
        };
        f.write_str(s)
    }
}

/// A submission to the external log did not succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub struct DeliveryError {
    pub kind: DeliveryErrorKind,

    /// The stream the event was addressed to.
    pub flow: FlowIdentifier,

    /// The HTTP status code, if the platform answered.
    pub status_code: Option<u16>,

    /// A human-readable cause.
    pub message: String,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(
                f,
                "failed to write to {} ({}, HTTP {}): {}",
                self.flow, self.kind, code, self.message
            ),
            None => write!(
                f,
                "failed to write to {} ({}): {}",
                self.flow, self.kind, self.message
            ),
        }
    }
}

impl DeliveryError {
    pub fn new(
        kind: DeliveryErrorKind,
        flow: FlowIdentifier,
        status_code: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        DeliveryError {
            kind,
            flow,
            status_code,
            message: message.into(),
        }
    }

    /// Classifies a non-success HTTP answer from the platform.
    pub fn from_status(flow: FlowIdentifier, status: u16, body: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => DeliveryErrorKind::Authentication,
            408 | 504 => DeliveryErrorKind::Timeout,
            400..=499 => DeliveryErrorKind::Rejected,
            _ => DeliveryErrorKind::Transport,
        };
        DeliveryError::new(kind, flow, Some(status), body)
    }
}

/// Capability to append events to the external log.
pub trait EventWriter: Send + Sync + 'static {
    /// Submits one event to the stream named by `flow`.
    fn submit(
        &self,
        flow: &FlowIdentifier,
        event: &serde_json::Value,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Validates a typed event against its contract and submits it.
pub async fn submit_event<W, C>(writer: &W, event: &C) -> Result<(), DeliveryError>
where
    W: EventWriter,
    C: Contract,
{
    let flow = C::flow();
    event.validate().map_err(|e| {
        DeliveryError::new(DeliveryErrorKind::Rejected, flow.clone(), None, e.to_string())
    })?;
    let value = serde_json::to_value(event).map_err(|e| {
        DeliveryError::new(DeliveryErrorKind::Rejected, flow.clone(), None, e.to_string())
    })?;

    writer.submit(&flow, &value).await?;
    debug!(flow = %flow, "Event submitted");
    Ok(())
}

/// A writer that keeps submissions in memory.
///
/// Clones share the same record. Used for local runs and tests; it can be
/// told to fail every submission with a fixed error.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    inner: Arc<Mutex<MemoryWriterInner>>,
}

#[derive(Debug, Default)]
struct MemoryWriterInner {
    submitted: Vec<(FlowIdentifier, serde_json::Value)>,
    failure: Option<DeliveryErrorKind>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent submission fail with `kind`.
    pub fn fail_with(&self, kind: DeliveryErrorKind) {
        self.lock().failure = Some(kind);
    }

    /// Returns everything submitted so far, oldest first.
    pub fn submitted(&self) -> Vec<(FlowIdentifier, serde_json::Value)> {
        self.lock().submitted.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryWriterInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventWriter for MemoryWriter {
    async fn submit(
        &self,
        flow: &FlowIdentifier,
        event: &serde_json::Value,
    ) -> Result<(), DeliveryError> {
        let mut inner = self.lock();
        if let Some(kind) = inner.failure {
            return Err(DeliveryError::new(
                kind,
                flow.clone(),
                None,
                "memory writer configured to fail",
            ));
        }
        inner.submitted.push((flow.clone(), event.clone()));
        Ok(())
    }
}

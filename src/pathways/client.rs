//! HTTP writer for the Flowcore webhook ingestion API.
//!
//! Events are posted one at a time to
//! `{base_url}/event/{tenant}/{data_core}/{flow_type}/{event_type}` with the
//! event as the JSON body and `Authorization: ApiKey <key>`. Any 2xx answer
//! means the event was appended to the log.

use reqwest::Url;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use thiserror::Error;
use tracing::{debug, warn};

use super::writer::{DeliveryError, DeliveryErrorKind, EventWriter};
use crate::config::FlowcoreConfig;
use crate::types::FlowIdentifier;

/// The client could not be constructed from configuration.
#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("invalid API key: not a valid header value")]
    InvalidApiKey,

    #[error("webhook base URL cannot carry a path: {0}")]
    UnusableBaseUrl(Url),

    #[error("failed to create HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Posts events to the Flowcore webhook API.
#[derive(Clone)]
pub struct FlowcoreWebhookClient {
    http_client: reqwest::Client,
    base_url: Url,
    tenant: String,
    data_core: String,
}

impl FlowcoreWebhookClient {
    /// Creates a client; every request is bounded by `config.timeout`.
    pub fn new(config: &FlowcoreConfig) -> Result<Self, ClientBuildError> {
        if config.webhook_base_url.cannot_be_a_base() {
            return Err(ClientBuildError::UnusableBaseUrl(
                config.webhook_base_url.clone(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth_value = HeaderValue::from_str(&format!("ApiKey {}", config.api_key))
            .map_err(|_| ClientBuildError::InvalidApiKey)?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(FlowcoreWebhookClient {
            http_client,
            base_url: config.webhook_base_url.clone(),
            tenant: config.tenant.clone(),
            data_core: config.data_core.clone(),
        })
    }

    /// The ingestion URL for one stream.
    pub fn event_url(&self, flow: &FlowIdentifier) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base URL can carry a path.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "event",
                self.tenant.as_str(),
                self.data_core.as_str(),
                flow.flow_type.as_str(),
                flow.event_type.as_str(),
            ]);
        }
        url
    }
}

impl std::fmt::Debug for FlowcoreWebhookClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowcoreWebhookClient")
            .field("base_url", &self.base_url.as_str())
            .field("tenant", &self.tenant)
            .field("data_core", &self.data_core)
            .finish_non_exhaustive()
    }
}

impl EventWriter for FlowcoreWebhookClient {
    async fn submit(
        &self,
        flow: &FlowIdentifier,
        event: &serde_json::Value,
    ) -> Result<(), DeliveryError> {
        let url = self.event_url(flow);

        let response = self
            .http_client
            .post(url)
            .json(event)
            .send()
            .await
            .map_err(|e| from_reqwest(flow, &e))?;

        let status = response.status();
        if status.is_success() {
            debug!(flow = %flow, status = status.as_u16(), "Flowcore accepted event");
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        let err = DeliveryError::from_status(flow.clone(), status.as_u16(), body);
        warn!(flow = %flow, kind = %err.kind, status = status.as_u16(), "Flowcore rejected event");
        Err(err)
    }
}

fn from_reqwest(flow: &FlowIdentifier, err: &reqwest::Error) -> DeliveryError {
    let kind = if err.is_timeout() {
        DeliveryErrorKind::Timeout
    } else {
        DeliveryErrorKind::Transport
    };
    warn!(flow = %flow, kind = %kind, error = %err, "Flowcore request failed");
    DeliveryError::new(kind, flow.clone(), None, format!("HTTP request failed: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TIMEOUT_SECS;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const BASE: &str = "https://webhook.api.flowcore.io";

    fn config(base: &str) -> FlowcoreConfig {
        FlowcoreConfig {
            tenant: "acme".to_string(),
            data_core: "flow-analytics".to_string(),
            webhook_base_url: Url::parse(base).unwrap(),
            api_key: "fc_test_key".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    fn client(base: &str) -> FlowcoreWebhookClient {
        FlowcoreWebhookClient::new(&config(base)).unwrap()
    }

    fn flow() -> FlowIdentifier {
        FlowIdentifier::new("visitor.v0", "visitor.tracked.v0")
    }

    #[test]
    fn event_url_appends_stream_path() {
        assert_eq!(
            client(BASE).event_url(&flow()).as_str(),
            concat!(
                "https://webhook.api.flowcore.io",
                "/event/acme/flow-analytics/visitor.v0/visitor.tracked.v0"
            )
        );
    }

    #[test]
    fn event_url_keeps_base_path() {
        let client = client("https://proxy.example.com/flowcore/");
        assert_eq!(
            client.event_url(&flow()).as_str(),
            concat!(
                "https://proxy.example.com/flowcore",
                "/event/acme/flow-analytics/visitor.v0/visitor.tracked.v0"
            )
        );
    }

    #[test]
    fn rejects_unusable_api_key() {
        let mut cfg = config(BASE);
        cfg.api_key = "line\nbreak".to_string();
        assert!(matches!(
            FlowcoreWebhookClient::new(&cfg),
            Err(ClientBuildError::InvalidApiKey)
        ));
    }

    #[test]
    fn rejects_non_base_url() {
        let cfg = config("mailto:ops@example.com");
        assert!(matches!(
            FlowcoreWebhookClient::new(&cfg),
            Err(ClientBuildError::UnusableBaseUrl(_))
        ));
    }

    #[test]
    fn debug_omits_api_key() {
        assert!(!format!("{:?}", client(BASE)).contains("fc_test_key"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        // Bind then drop, so nothing is listening on the port.
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let client = client(&format!("http://{}", addr));

        let err = client
            .submit(&flow(), &serde_json::json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.kind, DeliveryErrorKind::Transport);
        assert_eq!(err.status_code, None);
        assert_eq!(err.flow, flow());
    }

    #[tokio::test]
    async fn silent_endpoint_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and hold them open without answering.
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let mut cfg = config(&format!("http://{}", addr));
        cfg.timeout = Duration::from_secs(1);
        let client = FlowcoreWebhookClient::new(&cfg).unwrap();

        let err = client
            .submit(&flow(), &serde_json::json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.kind, DeliveryErrorKind::Timeout);
        assert_eq!(err.status_code, None);
        server.abort();
    }

    /// Returns `true` once `buf` holds the headers and the full body.
    fn request_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let body_len = text[..header_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        buf.len() >= header_end + 4 + body_len
    }

    /// Serves one connection: reads the request, then writes `response`.
    async fn respond_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request_complete(&request) {
                match socket.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&chunk[..n]),
                }
            }
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn unauthorized_answer_is_an_authentication_error() {
        let base = respond_once(
            "HTTP/1.1 401 Unauthorized\r\ncontent-length: 7\r\nconnection: close\r\n\r\nbad key",
        )
        .await;

        let err = client(&base)
            .submit(&flow(), &serde_json::json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.kind, DeliveryErrorKind::Authentication);
        assert_eq!(err.status_code, Some(401));
        assert_eq!(err.message, "bad key");
    }

    #[tokio::test]
    async fn accepted_answer_is_success() {
        let base =
            respond_once("HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await;

        client(&base)
            .submit(&flow(), &serde_json::json!({"pathname": "/"}))
            .await
            .unwrap();
    }
}

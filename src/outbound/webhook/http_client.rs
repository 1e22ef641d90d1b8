use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::ports::{DeliveryOutcome, WebhookTransport};

/// Default bound on one delivery, connect through body.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for HTTP client operations
#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Failed to build HTTP client: {0}")]
    Build(String),
}

impl HttpClientError {
    /// Classify a reqwest failure; `timeout` is the bound the client was built with.
    fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            HttpClientError::Timeout(timeout)
        } else if err.is_connect() {
            HttpClientError::NetworkError(err.to_string())
        } else {
            HttpClientError::RequestFailed(err.to_string())
        }
    }
}

/// HTTP client wrapper for webhook delivery
///
/// Owns one connection pool; construct it once at start-up and share it.
#[derive(Debug, Clone)]
pub struct WebhookHttpClient {
    client: Client,
    timeout: Duration,
}

impl WebhookHttpClient {
    /// Create a new HTTP client with default timeout (30 seconds)
    pub fn new() -> Result<Self, HttpClientError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpClientError> {
        Self::with_config(
            timeout,
            &format!("erp-webhooks/{}", env!("CARGO_PKG_VERSION")),
        )
    }

    pub fn with_config(timeout: Duration, user_agent: &str) -> Result<Self, HttpClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| HttpClientError::Build(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Get configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Read response body with size limit
    async fn read_response_body(&self, response: Response) -> Result<String, HttpClientError> {
        // The log keeps far less; this only bounds memory
        const MAX_BODY_SIZE: usize = 1024 * 1024;

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                HttpClientError::Timeout(self.timeout)
            } else {
                HttpClientError::RequestFailed(format!("Failed to read response body: {e}"))
            }
        })?;

        if bytes.len() > MAX_BODY_SIZE {
            debug!(
                size = bytes.len(),
                max_size = MAX_BODY_SIZE,
                "Response body too large, truncating"
            );
        }

        Ok(String::from_utf8_lossy(&bytes[..bytes.len().min(MAX_BODY_SIZE)]).into_owned())
    }
}

/// Engine defaults first, caller headers next, body length last.
fn merge_headers(caller: &HeaderMap, body_len: usize) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for (name, value) in caller {
        headers.insert(name.clone(), value.clone());
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body_len));
    headers
}

#[async_trait]
impl WebhookTransport for WebhookHttpClient {
    async fn send(&self, url: &str, headers: HeaderMap, body: &[u8]) -> DeliveryOutcome {
        debug!(url = %url, bytes = body.len(), "Sending webhook");

        let start = Instant::now();
        let result = self
            .client
            .post(url)
            .headers(merge_headers(&headers, body.len()))
            .body(body.to_vec())
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let err = HttpClientError::from_reqwest(e, self.timeout);
                let duration_ms = start.elapsed().as_millis() as u64;
                warn!(url = %url, error = %err, duration_ms, "Webhook request failed");
                return DeliveryOutcome::transport_failure(err.to_string(), duration_ms);
            }
        };

        let status_code = response.status().as_u16();
        let response_body = match self.read_response_body(response).await {
            Ok(body) => body,
            Err(err @ HttpClientError::Timeout(_)) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                warn!(url = %url, status = status_code, error = %err, duration_ms, "Webhook response timed out");
                return DeliveryOutcome::transport_failure(err.to_string(), duration_ms);
            }
            Err(e) => {
                // The receiver did answer; keep its status and drop the body
                warn!(url = %url, status = status_code, error = %e, "Could not read webhook response");
                String::new()
            }
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        debug!(
            url = %url,
            status = status_code,
            response_time_ms = duration_ms,
            "Webhook response received"
        );

        DeliveryOutcome::completed(status_code, response_body, duration_ms)
    }
}

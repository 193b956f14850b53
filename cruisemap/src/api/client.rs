//! HTTP client abstraction for testability.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

use super::endpoint::ApiEndpoint;
use super::error::TransportError;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single JSON `POST` against the map API.
///
/// Implementations perform exactly one attempt; retries belong to
/// [`Transport`](super::Transport). This trait uses `Pin<Box<dyn Future>>`
/// so that engines can hold an `Arc<dyn ApiClient>` and tests can inject
/// scripted clients.
pub trait ApiClient: Send + Sync {
    /// Posts `body` to `endpoint` and returns the decoded JSON response.
    fn post(&self, endpoint: ApiEndpoint, body: Value) -> BoxFuture<'_, Result<Value, TransportError>>;
}

/// Real API client using reqwest.
pub struct ReqwestClient {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestClient {
    /// Creates a client for `base_url` with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    /// Creates a client for `base_url` with a custom timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ApiClient for ReqwestClient {
    fn post(&self, endpoint: ApiEndpoint, body: Value) -> BoxFuture<'_, Result<Value, TransportError>> {
        Box::pin(async move {
            let url = endpoint.url(&self.base_url);
            let request_error = |e: reqwest::Error| TransportError::Request {
                endpoint,
                message: e.to_string(),
            };

            let response = self
                .client
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string())
                .send()
                .await
                .map_err(request_error)?;

            // Check HTTP status
            if !response.status().is_success() {
                return Err(TransportError::Status {
                    endpoint,
                    status: response.status().as_u16(),
                });
            }

            let bytes = response.bytes().await.map_err(request_error)?;
            serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode {
                endpoint,
                message: e.to_string(),
            })
        })
    }
}

//! Retrying request wrapper.
//!
//! [`Transport::send`] never fails: after the retry budget is spent it logs a
//! warning and resolves to `None`, and callers treat that as "no data".

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::client::ApiClient;
use super::endpoint::ApiEndpoint;
use super::error::TransportError;
use super::policy::RetryPolicy;
use super::records::ApiRequest;

/// Sends API requests with bounded retry and exponential backoff.
#[derive(Clone)]
pub struct Transport {
    client: Arc<dyn ApiClient>,
    policy: RetryPolicy,
    shutdown: CancellationToken,
}

impl Transport {
    /// Creates a transport over `client`.
    pub fn new(client: Arc<dyn ApiClient>, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            shutdown: CancellationToken::new(),
        }
    }

    /// Aborts pending backoff sleeps when `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Retry policy in use.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Posts `request` to `endpoint`.
    ///
    /// Network errors, non-success statuses, invalid JSON and responses
    /// carrying an `errors` field all count as failed attempts.
    pub async fn send(&self, endpoint: ApiEndpoint, request: &ApiRequest) -> Option<Value> {
        let body = match serde_json::to_value(request) {
            Ok(body) => body,
            Err(e) => {
                warn!(%endpoint, error = %e, "Failed to encode request body");
                return None;
            }
        };

        let max_attempts = self.policy.max_attempts();
        for attempt in 1..=max_attempts {
            if self.shutdown.is_cancelled() {
                return None;
            }

            let result = self
                .client
                .post(endpoint, body.clone())
                .await
                .and_then(|response| check_application_errors(endpoint, response));

            let error = match result {
                Ok(response) => {
                    debug!(%endpoint, attempt, "API request succeeded");
                    return Some(response);
                }
                Err(e) => e,
            };

            let Some(delay) = self.policy.delay_for_attempt(attempt) else {
                warn!(
                    %endpoint,
                    attempts = attempt,
                    error = %error,
                    "API request failed, giving up"
                );
                break;
            };

            debug!(
                %endpoint,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "API request failed, retrying"
            );

            tokio::select! {
                _ = self.shutdown.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        None
    }
}

/// Turns a response carrying an `errors` field into an error.
fn check_application_errors(endpoint: ApiEndpoint, response: Value) -> Result<Value, TransportError> {
    match response.get("errors") {
        None | Some(Value::Null) => Ok(response),
        Some(Value::Array(items)) => Err(TransportError::Application {
            endpoint,
            errors: items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        }),
        Some(other) => Err(TransportError::Application {
            endpoint,
            errors: vec![other.to_string()],
        }),
    }
}

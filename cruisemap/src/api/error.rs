//! Transport error types.

use thiserror::Error;

use super::endpoint::ApiEndpoint;

/// Errors raised by a single API request attempt.
///
/// These never leave the [`Transport`](super::Transport): it retries and
/// degrades to "no data".
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Network-level failure (connect, timeout, body read).
    #[error("Request to {endpoint} failed: {message}")]
    Request {
        endpoint: ApiEndpoint,
        message: String,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status} from {endpoint}")]
    Status { endpoint: ApiEndpoint, status: u16 },

    /// Response body is not valid JSON.
    #[error("Invalid JSON from {endpoint}: {message}")]
    Decode {
        endpoint: ApiEndpoint,
        message: String,
    },

    /// Response carried an `errors` field.
    #[error("API error from {endpoint}: {}", .errors.join("; "))]
    Application {
        endpoint: ApiEndpoint,
        errors: Vec<String>,
    },

    /// The HTTP client could not be constructed.
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),
}

//! Engine error types.

use thiserror::Error;

use crate::api::TransportError;

/// Errors raised while constructing an engine.
///
/// Data accessors never fail; missing data shows up as empty results.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The HTTP client could not be built.
    #[error("Failed to create API client: {0}")]
    Client(#[from] TransportError),
}

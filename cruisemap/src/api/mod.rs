//! Map API access.
//!
//! - [`ApiClient`]: one JSON `POST`, implemented over reqwest by [`ReqwestClient`]
//! - [`Transport`]: retries with [`RetryPolicy`] and degrades failures to `None`
//! - [`records`]: serde wire records and lenient decoding helpers
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use cruisemap::api::{ApiEndpoint, ApiRequest, ReqwestClient, RetryPolicy, Transport};
//!
//! let client = Arc::new(ReqwestClient::new("https://krubiss.ru/api/map")?);
//! let transport = Transport::new(client, RetryPolicy::default());
//! let stops = transport.send(ApiEndpoint::Stops, &ApiRequest::empty()).await;
//! ```

mod client;
mod endpoint;
mod error;
mod policy;
pub mod records;
mod transport;

pub use client::{ApiClient, BoxFuture, ReqwestClient, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use endpoint::{ApiEndpoint, DEFAULT_API_URL, DEFAULT_SITE_URL};
pub use error::TransportError;
pub use policy::{
    RetryPolicy, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY_SECS,
};
pub use records::{ApiRequest, RequestId};
pub use transport::Transport;

#[cfg(test)]
pub use client::tests::MockApiClient;

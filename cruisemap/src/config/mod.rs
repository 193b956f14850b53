//! Engine configuration.
//!
//! [`EngineConfig`] holds every tunable of the engine with documented
//! defaults. [`ConfigFile`] reads overrides from an INI file in the platform
//! config directory.
//!
//! # Example
//!
//! ```ignore
//! use cruisemap::config::{ConfigFile, EngineConfig};
//!
//! let config = ConfigFile::load()?.with_max_batch(20);
//! let engine = CruiseEngine::new(config)?;
//! ```

mod file;

use std::time::Duration;

use crate::api::{
    RetryPolicy, DEFAULT_API_URL, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SITE_URL,
};
use crate::loader::{CoalescerConfig, DEFAULT_BATCH_WINDOW_MS, DEFAULT_MAX_BATCH, DEFAULT_MAX_IN_FLIGHT};

pub use file::{config_path, ConfigError, ConfigFile};

/// Engine configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Base URL of the map API.
    pub api_url: String,

    /// Site URL that relative links are resolved against.
    pub site_url: String,

    /// Timeout of a single HTTP request.
    pub request_timeout: Duration,

    /// How long batched requests collect ids before sending.
    pub batch_window: Duration,

    /// Maximum ids per batched request.
    pub max_batch: usize,

    /// Attempts per request, including the first.
    pub retry_attempts: u32,

    /// Delay after the first failed attempt.
    pub retry_initial_delay: Duration,

    /// Backoff multiplier between attempts.
    pub retry_multiplier: f64,

    /// Maximum concurrent route stage fetches.
    pub max_concurrent_fetches: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            site_url: DEFAULT_SITE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            batch_window: Duration::from_millis(DEFAULT_BATCH_WINDOW_MS),
            max_batch: DEFAULT_MAX_BATCH,
            retry_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            retry_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_concurrent_fetches: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl EngineConfig {
    /// Set the API base URL.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the site URL.
    pub fn with_site_url(mut self, url: impl Into<String>) -> Self {
        self.site_url = url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the batch collection window.
    pub fn with_batch_window(mut self, window: Duration) -> Self {
        self.batch_window = window;
        self
    }

    /// Set the maximum batch size.
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch;
        self
    }

    /// Set the retry parameters.
    pub fn with_retry(mut self, attempts: u32, initial_delay: Duration, multiplier: f64) -> Self {
        self.retry_attempts = attempts;
        self.retry_initial_delay = initial_delay;
        self.retry_multiplier = multiplier;
        self
    }

    /// Set the maximum number of concurrent stage fetches.
    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max;
        self
    }

    /// Retry policy for the transport.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_settings(self.retry_attempts, self.retry_initial_delay, self.retry_multiplier)
    }

    /// Coalescer settings for batched requests.
    pub fn coalescer(&self) -> CoalescerConfig {
        CoalescerConfig {
            window: self.batch_window,
            max_batch: self.max_batch,
        }
    }
}

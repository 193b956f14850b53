//! Logging setup.
//!
//! Installs a `tracing` subscriber with:
//!
//! - an [`EnvFilter`] from `RUST_LOG`, falling back to [`DEFAULT_FILTER`]
//! - a compact stderr layer with local timestamps
//! - an optional non-blocking file layer
//!
//! Keep the returned guard alive for as long as file logging is wanted;
//! dropping it flushes the file.

use std::path::PathBuf;

pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "cruisemap=info";

/// Logging options.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directive used when `RUST_LOG` is unset.
    pub default_filter: String,
    /// Also write logs to this file.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_filter: DEFAULT_FILTER.to_string(),
            file: None,
        }
    }
}

impl LogConfig {
    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// The effective filter: `RUST_LOG` if set and valid, else the default.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

/// Installs the global subscriber.
///
/// Returns the file writer guard when a log file is configured. Calling this
/// twice leaves the first subscriber in place.
pub fn init(config: &LogConfig) -> Option<WorkerGuard> {
    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::rfc_3339())
        .with_target(false)
        .compact();

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let directory = path.parent().map(PathBuf::from).unwrap_or_default();
            let file_name = path
                .file_name()
                .map(|name| name.to_os_string())
                .unwrap_or_else(|| "cruisemap.log".into());
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTime::rfc_3339())
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(config.env_filter())
        .with(stderr)
        .with(file_layer)
        .try_init();

    guard
}

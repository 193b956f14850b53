//! CLI error type.

use cruisemap::config::ConfigError;
use cruisemap::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Invalid date '{0}'. Use YYYY-MM-DD, DD.MM.YYYY or either with HH:MM")]
    InvalidDate(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
}

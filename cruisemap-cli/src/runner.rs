//! Shared setup for engine-backed commands.

use std::future::Future;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Args;
use cruisemap::config::{ConfigFile, EngineConfig};
use cruisemap::logging::{self, LogConfig, WorkerGuard};
use cruisemap::model::parse_date;
use cruisemap::CruiseEngine;
use tokio::runtime::Runtime;
use tracing::info;

use crate::error::CliError;

/// Options accepted by every command.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Override the API base URL from the config file
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Logging, configuration and a runtime, set up once per invocation.
pub struct CliRunner {
    config: EngineConfig,
    runtime: Runtime,
    _log_guard: Option<WorkerGuard>,
}

impl CliRunner {
    pub fn new(args: &GlobalArgs) -> Result<Self, CliError> {
        let mut log_config = LogConfig::default();
        if args.verbose {
            log_config = log_config.with_default_filter("cruisemap=debug");
        }
        if let Some(path) = &args.log_file {
            log_config = log_config.with_file(path);
        }
        let log_guard = logging::init(&log_config);

        let mut config = ConfigFile::load()?;
        if let Some(url) = &args.api_url {
            config = config.with_api_url(url);
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(CliError::Runtime)?;

        Ok(Self {
            config,
            runtime,
            _log_guard: log_guard,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            command,
            version = cruisemap::VERSION,
            api = %self.config.api_url,
            "cruisemap starting"
        );
    }

    /// Builds an engine inside the runtime, so its background tasks have
    /// somewhere to run.
    pub fn engine(&self) -> Result<CruiseEngine, CliError> {
        let _guard = self.runtime.enter();
        Ok(CruiseEngine::new(self.config.clone())?)
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// Parses a date argument in any format the API uses.
pub fn parse_date_arg(input: &str) -> Result<DateTime<Utc>, CliError> {
    parse_date(input).ok_or_else(|| CliError::InvalidDate(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_date_arg() {
        assert_eq!(
            parse_date_arg("2024-06-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_date_arg("01.06.2024 12:30").unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap()
        );
        assert!(matches!(
            parse_date_arg("tomorrow"),
            Err(CliError::InvalidDate(input)) if input == "tomorrow"
        ));
    }
}

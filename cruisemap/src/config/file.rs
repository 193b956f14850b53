//! INI configuration file.
//!
//! Lives at `<config_dir>/cruisemap/config.ini`:
//!
//! ```ini
//! [api]
//! url = https://krubiss.ru/api/map
//! site_url = https://krubiss.ru
//! timeout_secs = 30
//! retry_attempts = 3
//! retry_initial_delay_ms = 2000
//! retry_multiplier = 2.0
//!
//! [loading]
//! batch_window_ms = 10
//! max_batch = 50
//! max_concurrent_fetches = 5
//! ```
//!
//! Every key is optional. A missing file yields the defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;
use tracing::debug;

use super::EngineConfig;

const API_SECTION: &str = "api";
const LOADING_SECTION: &str = "loading";

/// Errors raised while reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for [{section}] {key}: '{value}'")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
    },

    #[error("Could not determine the platform config directory")]
    NoConfigDir,
}

/// Default location of the configuration file.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("cruisemap").join("config.ini"))
}

/// Reads and writes [`EngineConfig`] as INI.
pub struct ConfigFile;

impl ConfigFile {
    /// Loads the configuration from the default location.
    pub fn load() -> Result<EngineConfig, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(EngineConfig::default()),
        }
    }

    /// Loads the configuration from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<EngineConfig, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(EngineConfig::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ini = Ini::load_from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let config = Self::from_ini(&ini)?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Applies the settings in `ini` over the defaults.
    pub fn from_ini(ini: &Ini) -> Result<EngineConfig, ConfigError> {
        let mut config = EngineConfig::default();

        if let Some(api) = ini.section(Some(API_SECTION)) {
            if let Some(url) = api.get("url") {
                config.api_url = url.trim().to_string();
            }
            if let Some(url) = api.get("site_url") {
                config.site_url = url.trim().to_string();
            }
            if let Some(secs) = parse_key::<u64>(api, API_SECTION, "timeout_secs")? {
                config.request_timeout = Duration::from_secs(secs);
            }
            if let Some(attempts) = parse_key::<u32>(api, API_SECTION, "retry_attempts")? {
                config.retry_attempts = attempts;
            }
            if let Some(ms) = parse_key::<u64>(api, API_SECTION, "retry_initial_delay_ms")? {
                config.retry_initial_delay = Duration::from_millis(ms);
            }
            if let Some(multiplier) = parse_key::<f64>(api, API_SECTION, "retry_multiplier")? {
                config.retry_multiplier = multiplier;
            }
        }

        if let Some(loading) = ini.section(Some(LOADING_SECTION)) {
            if let Some(ms) = parse_key::<u64>(loading, LOADING_SECTION, "batch_window_ms")? {
                config.batch_window = Duration::from_millis(ms);
            }
            if let Some(max) = parse_key::<usize>(loading, LOADING_SECTION, "max_batch")? {
                config.max_batch = max;
            }
            if let Some(max) = parse_key::<usize>(loading, LOADING_SECTION, "max_concurrent_fetches")? {
                config.max_concurrent_fetches = max;
            }
        }

        Ok(config)
    }

    /// Renders `config` as INI.
    pub fn to_ini(config: &EngineConfig) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some(API_SECTION))
            .set("url", config.api_url.as_str())
            .set("site_url", config.site_url.as_str())
            .set("timeout_secs", config.request_timeout.as_secs().to_string())
            .set("retry_attempts", config.retry_attempts.to_string())
            .set(
                "retry_initial_delay_ms",
                config.retry_initial_delay.as_millis().to_string(),
            )
            .set("retry_multiplier", config.retry_multiplier.to_string());
        ini.with_section(Some(LOADING_SECTION))
            .set("batch_window_ms", config.batch_window.as_millis().to_string())
            .set("max_batch", config.max_batch.to_string())
            .set(
                "max_concurrent_fetches",
                config.max_concurrent_fetches.to_string(),
            );
        ini
    }

    /// Renders `config` as an INI string.
    pub fn to_string(config: &EngineConfig) -> String {
        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = Self::to_ini(config).write_to(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Writes `config` to `path`, creating parent directories.
    pub fn save_to(config: &EngineConfig, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        Self::to_ini(config).write_to_file(path).map_err(io_error)
    }
}

fn parse_key<T: FromStr>(
    section: &Properties,
    section_name: &'static str,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match section.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                section: section_name,
                key,
                value: raw.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_overrides_and_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(
            &path,
            "[api]\nurl = http://localhost:9000/api\nretry_attempts = 5\nflavour = vanilla\n\n\
             [loading]\nbatch_window_ms = 25\nmax_concurrent_fetches = 2\n\n[unrelated]\nkey = 1\n",
        )
        .unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.api_url, "http://localhost:9000/api");
        assert_eq!(config.retry_attempts, 5);
        assert_eq!(config.batch_window, Duration::from_millis(25));
        assert_eq!(config.max_concurrent_fetches, 2);
        assert_eq!(config.max_batch, 50);
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[loading]\nmax_batch = lots\n").unwrap();

        let err = ConfigFile::load_from(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "max_batch",
                ..
            }
        ));
        assert_eq!(err.to_string(), "Invalid value for [loading] max_batch: 'lots'");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ini");
        let config = EngineConfig::default()
            .with_site_url("https://example.org")
            .with_max_batch(12)
            .with_request_timeout(Duration::from_secs(5));

        ConfigFile::save_to(&config, &path).unwrap();
        let reloaded = ConfigFile::load_from(&path).unwrap();

        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_to_string_has_sections() {
        let rendered = ConfigFile::to_string(&EngineConfig::default());
        assert!(rendered.contains("[api]"));
        assert!(rendered.contains("[loading]"));
        assert!(rendered.contains("max_batch=50"));
    }
}

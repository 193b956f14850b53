//! CruiseMap - data engine for cruise ship maps
//!
//! This library caches cruise, ship and company records fetched from the
//! cruise map API and loads route geometry progressively, so a map can show
//! interpolated ship positions without flooding a slow backend with requests.
//!
//! # Modules
//!
//! - [`engine`]: [`CruiseEngine`] lifecycle and accessors
//! - [`cache`]: sorted entity cache with a filtered cruise view
//! - [`loader`]: request coalescing, the stage fetch queue, per-cruise loading
//! - [`model`]: companies, ships, cruises, locations, routes
//! - [`api`]: HTTP client, retries, wire records
//! - [`index`]: ordered id-keyed container
//! - [`config`], [`logging`]: ambient setup
//!
//! # Example
//!
//! ```ignore
//! use cruisemap::{CruiseEngine, EngineConfig, MapMode};
//!
//! let engine = CruiseEngine::new(EngineConfig::default())?;
//! engine.start(MapMode::Fleet).await;
//! println!("{} cruises", engine.all_cruises().len());
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod index;
pub mod loader;
pub mod logging;
pub mod model;

pub use cache::FilterUpdate;
pub use config::EngineConfig;
pub use dataset::Dataset;
pub use engine::{CruiseEngine, EngineError, MapMode};
pub use loader::LoadPriority;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}

//! Engine lifecycle and public data accessors.
//!
//! [`CruiseEngine`] owns everything one map needs: the transport, the loader
//! context and the entity cache. Engines share nothing with each other.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                          CruiseEngine                          │
//! │                                                                │
//! │  start(mode) ──► Transport ──► EntityCache (companies, ships,   │
//! │                     ▲           cruises, filtered view)        │
//! │                     │                                          │
//! │  LoaderContext ─────┤                                          │
//! │   ├── BatchCoalescer (route stage 1) ──┐                       │
//! │   ├── PriorityFetchQueue (stages 2-4) ◄┘ BatchGate             │
//! │   ├── BatchCoalescer (cruise sights)                           │
//! │   ├── LocationLookup (showplaces)                              │
//! │   └── Dataset (stops, gateways)                                │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use cruisemap::engine::{CruiseEngine, MapMode};
//!
//! let engine = CruiseEngine::new(EngineConfig::default())?;
//! engine.start(MapMode::Fleet).await;
//!
//! for cruise in engine.all_cruises() {
//!     let position = cruise.position_at(Utc::now()).await;
//! }
//!
//! engine.shutdown();
//! ```

mod bootstrap;
mod error;
mod mode;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::{ApiClient, ReqwestClient, Transport};
use crate::cache::{CruiseFilter, EntityCache, FilterUpdate};
use crate::config::EngineConfig;
use crate::dataset::Dataset;
use crate::loader::LoaderContext;
use crate::model::{Company, Cruise, Location, LocationDictionary, Ship, TrackPoint};

pub use error::EngineError;
pub use mode::MapMode;

/// Cruise map data engine.
pub struct CruiseEngine {
    config: EngineConfig,
    transport: Transport,
    ctx: Arc<LoaderContext>,
    cache: RwLock<EntityCache>,
    cruises: Dataset<()>,
    ready: Dataset<()>,
    shutdown: CancellationToken,
}

impl CruiseEngine {
    /// Creates an engine talking to `config.api_url` over HTTP.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let client = ReqwestClient::with_timeout(config.api_url.clone(), config.request_timeout)?;
        Ok(Self::with_client(config, Arc::new(client)))
    }

    /// Creates an engine on top of any [`ApiClient`].
    pub fn with_client(config: EngineConfig, client: Arc<dyn ApiClient>) -> Self {
        let shutdown = CancellationToken::new();
        let transport = Transport::new(client, config.retry_policy()).with_shutdown(shutdown.clone());
        let ctx = Arc::new(LoaderContext::new(transport.clone(), &config, shutdown.clone()));
        Self {
            config,
            transport,
            ctx,
            cache: RwLock::new(EntityCache::new()),
            cruises: Dataset::new(),
            ready: Dataset::new(),
            shutdown,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Loading machinery shared by the cruises of this engine.
    pub fn loader(&self) -> &Arc<LoaderContext> {
        &self.ctx
    }

    /// Stops background work: pending batches resolve empty, queued stage
    /// fetches are dropped and retry waits end.
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        info!("Shutting down cruise engine");
        self.shutdown.cancel();
        self.ctx.queue.clear();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    // =========================================================================
    // Datasets
    // =========================================================================

    /// Resolved once cruises, ships and companies are in the cache.
    pub fn cruises_loaded(&self) -> &Dataset<()> {
        &self.cruises
    }

    /// Resolved once [`start`](Self::start) has finished.
    pub fn ready(&self) -> &Dataset<()> {
        &self.ready
    }

    pub fn stops_loaded(&self) -> &Dataset<Arc<LocationDictionary>> {
        &self.ctx.stops
    }

    pub fn gateways_loaded(&self) -> &Dataset<Arc<LocationDictionary>> {
        &self.ctx.gateways
    }

    // =========================================================================
    // Cache accessors
    // =========================================================================

    /// Merges `update` into the filter of the active cruise view.
    pub fn set_filter(&self, update: FilterUpdate) {
        self.cache.write().set_filter(&update);
    }

    pub fn filter(&self) -> CruiseFilter {
        self.cache.read().filter().clone()
    }

    pub fn all_cruises(&self) -> Vec<Arc<Cruise>> {
        self.cache.read().all_cruises()
    }

    pub fn all_ships(&self) -> Vec<Arc<Ship>> {
        self.cache.read().all_ships()
    }

    pub fn all_companies(&self) -> Vec<Arc<Company>> {
        self.cache.read().all_companies()
    }

    /// Every stop, once the stops dictionary is loaded.
    pub fn all_stops(&self) -> Vec<Arc<Location>> {
        self.ctx.stops.get().map(|d| d.to_vec()).unwrap_or_default()
    }

    /// Every showplace resolved so far.
    pub fn all_sights(&self) -> Vec<Arc<Location>> {
        self.ctx.showplaces.ready()
    }

    /// Every gateway, once the gateways dictionary is loaded.
    pub fn all_gateways(&self) -> Vec<Arc<Location>> {
        self.ctx.gateways.get().map(|d| d.to_vec()).unwrap_or_default()
    }

    pub fn company(&self, id: &str) -> Option<Arc<Company>> {
        self.cache.read().company(id)
    }

    pub fn ship(&self, id: &str) -> Option<Arc<Ship>> {
        self.cache.read().ship(id)
    }

    pub fn cruise(&self, id: &str) -> Option<Arc<Cruise>> {
        self.cache.read().cruise(id)
    }

    pub fn navigation_start_date(&self) -> Option<DateTime<Utc>> {
        self.cache.read().navigation_start_date()
    }

    pub fn navigation_end_date(&self) -> Option<DateTime<Utc>> {
        self.cache.read().navigation_end_date()
    }

    pub fn company_cruises(&self, company_id: &str) -> Vec<Arc<Cruise>> {
        self.cache.read().company_cruises(company_id)
    }

    pub fn company_ships(&self, company_id: &str) -> Vec<Arc<Ship>> {
        self.cache.read().company_ships(company_id)
    }

    pub fn ship_cruises(&self, ship_id: &str) -> Vec<Arc<Cruise>> {
        self.cache.read().ship_cruises(ship_id)
    }

    pub fn ship_navigation_start(&self, ship_id: &str) -> Option<DateTime<Utc>> {
        self.cache.read().ship_navigation_start(ship_id)
    }

    pub fn ship_navigation_end(&self, ship_id: &str) -> Option<DateTime<Utc>> {
        self.cache.read().ship_navigation_end(ship_id)
    }

    pub fn cruises_on(&self, ship_id: &str, at: DateTime<Utc>) -> Vec<Arc<Cruise>> {
        self.cache.read().cruises_on(ship_id, at)
    }

    pub fn cruise_on(&self, ship_id: &str, at: DateTime<Utc>) -> Option<Arc<Cruise>> {
        self.cache.read().cruise_on(ship_id, at)
    }

    /// Position of a ship at `at`; an idle ship is reported at the origin.
    pub async fn ship_position_at(&self, ship_id: &str, at: DateTime<Utc>) -> TrackPoint {
        let cruise = self.cruise_on(ship_id, at);
        match cruise {
            Some(cruise) => cruise.position_at(at).await,
            None => TrackPoint::idle(at),
        }
    }
}

impl Drop for CruiseEngine {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

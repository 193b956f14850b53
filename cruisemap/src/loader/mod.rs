//! Route and location loading.
//!
//! The loader turns many small, bursty requests from the map into few API
//! calls:
//!
//! - [`BatchCoalescer`]: collects ids for a short window and sends one request
//!   (first-stage geometry, per-cruise showplace lists, showplace records)
//! - [`PriorityFetchQueue`]: runs refinement stage fetches one cruise at a time
//!   with bounded concurrency and priority promotion
//! - [`BatchGate`]: keeps the two from dispatching at the same time
//! - [`LocationLookup`]: deduplicated showplace dictionary
//! - [`RouteLoadingController`]: per-cruise stage machine driving all of the above
//!
//! Everything hangs off one [`LoaderContext`] per engine.

mod coalescer;
mod controller;
mod gate;
mod locations;
mod queue;
mod sources;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::records::{SightVisitRecord, TrackPointRecord};
use crate::api::Transport;
use crate::config::EngineConfig;
use crate::dataset::Dataset;
use crate::model::LocationDictionary;

pub use coalescer::{
    BatchCoalescer, BatchSource, CoalescerConfig, DEFAULT_BATCH_WINDOW_MS, DEFAULT_MAX_BATCH,
};
pub use controller::{RouteLoadingController, SharedRoute, COMPLETE_STAGE};
pub use gate::{BatchGate, GateGuard};
pub use locations::{LocationEntry, LocationLookup};
pub use queue::{
    LoadPriority, PriorityFetchQueue, StageFetch, StagePoints, StageSource, DEFAULT_MAX_IN_FLIGHT,
};
pub use sources::{CruiseSights, FirstStagePoints, ShowplacesById, StagePointsSource, FIRST_STAGE};

/// Shared loading machinery of one engine.
pub struct LoaderContext {
    pub(crate) route_batches: BatchCoalescer<Arc<Vec<TrackPointRecord>>>,
    pub(crate) cruise_sights: BatchCoalescer<Arc<Vec<SightVisitRecord>>>,
    pub(crate) queue: PriorityFetchQueue,
    pub(crate) showplaces: LocationLookup,
    pub(crate) stops: Dataset<Arc<LocationDictionary>>,
    pub(crate) gateways: Dataset<Arc<LocationDictionary>>,
    pub(crate) site_url: String,
}

impl LoaderContext {
    pub fn new(transport: Transport, config: &EngineConfig, shutdown: CancellationToken) -> Self {
        let gate = BatchGate::new();
        let batching = config.coalescer();

        let route_batches = BatchCoalescer::with_shutdown(
            "route",
            Arc::new(FirstStagePoints::new(transport.clone())),
            batching.clone(),
            Some(gate.clone()),
            shutdown.clone(),
        );

        let cruise_sights = BatchCoalescer::with_shutdown(
            "cruise_sights",
            Arc::new(CruiseSights::new(transport.clone())),
            batching.clone(),
            None,
            shutdown.clone(),
        );

        let showplaces = LocationLookup::new(BatchCoalescer::with_shutdown(
            "showplaces",
            Arc::new(ShowplacesById::new(transport.clone(), config.site_url.clone())),
            batching,
            None,
            shutdown.clone(),
        ));

        let queue = PriorityFetchQueue::with_shutdown(
            Arc::new(StagePointsSource::new(transport)),
            config.max_concurrent_fetches,
            gate,
            shutdown,
        );

        Self {
            route_batches,
            cruise_sights,
            queue,
            showplaces,
            stops: Dataset::new(),
            gateways: Dataset::new(),
            site_url: config.site_url.clone(),
        }
    }

    /// The stage fetch queue.
    pub fn queue(&self) -> &PriorityFetchQueue {
        &self.queue
    }

    /// The showplace dictionary.
    pub fn showplaces(&self) -> &LocationLookup {
        &self.showplaces
    }

    /// Stops dictionary, once loaded.
    pub fn stops(&self) -> &Dataset<Arc<LocationDictionary>> {
        &self.stops
    }

    /// Gateways dictionary, once loaded.
    pub fn gateways(&self) -> &Dataset<Arc<LocationDictionary>> {
        &self.gateways
    }

    pub fn site_url(&self) -> &str {
        &self.site_url
    }
}

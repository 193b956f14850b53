//! Cruise entity.
//!
//! A [`Cruise`] owns its loading controller and lazily derives its location
//! lists. All accessors degrade to empty results; none of them fail.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::api::records::{CruiseRecord, SightVisitRecord, StopVisitRecord};
use crate::index::Keyed;
use crate::loader::{LoadPriority, LoaderContext, RouteLoadingController, SharedRoute};

use super::date::{parse_date, parse_opt_date};
use super::types::{absolute_url, Company, Ship, Side, TrackLocation, TrackPoint};

/// A cruise of one ship.
pub struct Cruise {
    pub id: String,
    pub name: String,
    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
    pub departure_location_name: String,
    pub arrival_location_name: String,
    /// Absolute page URL.
    pub url: Option<String>,
    pub ship: Arc<Ship>,
    stop_visits: Vec<StopVisitRecord>,
    inline_sights: Option<Arc<Vec<SightVisitRecord>>>,
    sights: OnceCell<Vec<TrackLocation>>,
    controller: Arc<RouteLoadingController>,
    ctx: Arc<LoaderContext>,
}

impl Cruise {
    /// Builds a cruise from its wire record.
    ///
    /// Returns `None` for records without both dates. A record carrying its
    /// points starts with a complete route.
    pub fn from_record(record: CruiseRecord, ship: Arc<Ship>, ctx: Arc<LoaderContext>) -> Option<Self> {
        if !record.is_sane() {
            debug!(cruise_id = %record.id, "Dropping cruise without ship or dates");
            return None;
        }
        let (Some(departure), Some(arrival)) = (
            parse_opt_date(record.departure.as_deref()),
            parse_opt_date(record.arrival.as_deref()),
        ) else {
            debug!(cruise_id = %record.id, "Dropping cruise with unparsable dates");
            return None;
        };

        let controller = match &record.points {
            Some(points) => RouteLoadingController::with_route(record.id.clone(), ctx.clone(), points),
            None => RouteLoadingController::new(record.id.clone(), ctx.clone()),
        };

        Some(Self {
            url: absolute_url(record.url.as_deref(), &ctx.site_url),
            id: record.id,
            name: record.name,
            departure,
            arrival,
            departure_location_name: record.departure_location_name,
            arrival_location_name: record.arrival_location_name,
            ship,
            stop_visits: record.stops,
            inline_sights: record.sights.map(Arc::new),
            sights: OnceCell::new(),
            controller: Arc::new(controller),
            ctx,
        })
    }

    pub fn company(&self) -> Option<&Arc<Company>> {
        self.ship.company.as_ref()
    }

    /// Whether the ship is under way on this cruise at `at`.
    pub fn is_in_progress_at(&self, at: DateTime<Utc>) -> bool {
        self.departure <= at && at <= self.arrival
    }

    /// Highest route stage loaded, 0 to 4.
    pub fn route_ready_stage(&self) -> u8 {
        self.controller.stage()
    }

    /// The route, loading its first stage if needed.
    pub async fn route(&self) -> SharedRoute {
        self.controller.route().await
    }

    /// Interpolated ship position at `at`.
    pub async fn position_at(&self, at: DateTime<Utc>) -> TrackPoint {
        self.route().await.read().position_at(at)
    }

    /// Stops of the cruise, once the stops dictionary is loaded.
    pub async fn stops(&self) -> Vec<TrackLocation> {
        let dictionary = self.ctx.stops.wait().await;
        self.stop_visits
            .iter()
            .filter_map(|visit| {
                let location = dictionary.get(&visit.id)?.clone();
                Some(TrackLocation {
                    arrival: parse_opt_date(visit.arrival.as_deref())?,
                    departure: parse_opt_date(visit.departure.as_deref()),
                    side: None,
                    location,
                })
            })
            .collect()
    }

    /// Showplaces along the route. Loaded on first call.
    pub async fn sights(&self) -> Vec<TrackLocation> {
        self.sights
            .get_or_init(|| self.load_sights())
            .await
            .clone()
    }

    async fn load_sights(&self) -> Vec<TrackLocation> {
        let visits = match &self.inline_sights {
            Some(visits) => visits.clone(),
            None => self.ctx.cruise_sights.request(self.id.clone()).await,
        };

        let ids: Vec<String> = visits.iter().map(|visit| visit.id.clone()).collect();
        self.ctx.showplaces.ensure(&ids).await;

        visits
            .iter()
            .filter_map(|visit| {
                let location = self.ctx.showplaces.get(&visit.id)?;
                Some(TrackLocation {
                    arrival: parse_date(visit.arrival.as_deref()?)?,
                    departure: None,
                    side: visit.side.as_deref().and_then(Side::parse),
                    location,
                })
            })
            .collect()
    }

    /// Gateways passed, once the first route stage and the gateways
    /// dictionary are loaded.
    pub async fn gateways(&self) -> Vec<TrackLocation> {
        self.route().await;
        let Some(extras) = self.controller.extras() else {
            return Vec::new();
        };
        let dictionary = self.ctx.gateways.wait().await;
        extras
            .gateways
            .iter()
            .filter_map(|pass| {
                Some(TrackLocation {
                    arrival: pass.arrival,
                    departure: None,
                    side: None,
                    location: dictionary.get(&pass.gateway_id)?.clone(),
                })
            })
            .collect()
    }

    /// Sunrise points of the first route stage.
    pub async fn sunrises(&self) -> Vec<TrackPoint> {
        self.route().await;
        self.controller
            .extras()
            .map(|extras| extras.sunrises.clone())
            .unwrap_or_default()
    }

    /// Sunset points of the first route stage.
    pub async fn sunsets(&self) -> Vec<TrackPoint> {
        self.route().await;
        self.controller
            .extras()
            .map(|extras| extras.sunsets.clone())
            .unwrap_or_default()
    }

    /// See [`RouteLoadingController::load_track_progressive`].
    pub fn load_track_progressive(&self, priority: LoadPriority) -> impl Future<Output = ()> + Send + 'static {
        self.controller.load_track_progressive(priority)
    }

    pub fn set_high_priority_loading(&self, high: bool) {
        self.controller.set_high_priority_loading(high);
    }

    pub fn cancel_load_track(&self) {
        self.controller.cancel_load_track();
    }

    pub fn controller(&self) -> &Arc<RouteLoadingController> {
        &self.controller
    }
}

impl Keyed for Cruise {
    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Debug for Cruise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cruise")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("departure", &self.departure)
            .field("arrival", &self.arrival)
            .field("ship", &self.ship.id)
            .field("stage", &self.route_ready_stage())
            .finish_non_exhaustive()
    }
}

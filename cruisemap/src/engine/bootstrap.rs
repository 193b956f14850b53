//! Initial data load for each map mode.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::records::{
    decode_collection, decode_record, CompanyRecord, CruiseRecord, LocationRecord, ShipRecord,
};
use crate::api::{ApiEndpoint, ApiRequest};
use crate::cache::FilterUpdate;
use crate::model::{Location, LocationDictionary, LocationKind};

use super::{CruiseEngine, MapMode};

impl CruiseEngine {
    /// Loads the initial data for `mode`.
    ///
    /// Never fails: anything the server does not deliver is simply absent.
    /// When this returns, [`ready`](Self::ready) and every dataset are
    /// resolved.
    pub async fn start(&self, mode: MapMode) {
        info!(%mode, api = %self.config.api_url, "Starting cruise engine");

        match &mode {
            MapMode::Fleet => self.start_fleet().await,
            MapMode::Cruise(id) => self.start_cruise(id).await,
            MapMode::Stops(ids) => {
                self.start_locations(LocationKind::Stop, list_request(ids)).await
            }
            MapMode::SingleStop(id) => {
                self.start_locations(LocationKind::Stop, single_request(id)).await
            }
            MapMode::Places(ids) => {
                self.start_locations(LocationKind::Showplace, list_request(ids)).await
            }
            MapMode::SinglePlace(id) => {
                self.start_locations(LocationKind::Showplace, single_request(id)).await
            }
        }

        self.ctx.stops.resolve(Arc::new(LocationDictionary::new()));
        self.ctx.gateways.resolve(Arc::new(LocationDictionary::new()));
        self.cruises.resolve(());
        self.ready.resolve(());

        info!(
            %mode,
            cruises = self.cache.read().cruise_count(),
            stops = self.all_stops().len(),
            sights = self.all_sights().len(),
            "Cruise engine ready"
        );
    }

    async fn start_fleet(&self) {
        let response = self.transport.send(ApiEndpoint::Start, &ApiRequest::empty()).await;
        let Some(response) = response else {
            warn!("No fleet data received");
            return;
        };

        let companies: Vec<CompanyRecord> = decode_collection(response.get("companies"), "company");
        let ships: Vec<ShipRecord> = decode_collection(response.get("ships"), "ship");
        let cruises: Vec<CruiseRecord> = decode_collection(response.get("cruises"), "cruise");
        let received = cruises.len();

        let added = {
            let mut cache = self.cache.write();
            for company in companies {
                cache.add_company(company);
            }
            for ship in ships {
                cache.add_ship(ship);
            }
            let added = cache.add_cruises(cruises, &self.ctx);
            cache.set_filter(&FilterUpdate::new());
            added
        };
        info!(received, added, "Fleet cruises loaded");
        self.cruises.resolve(());

        self.load_stops().await;
        self.load_gateways().await;
    }

    async fn start_cruise(&self, cruise_id: &str) {
        let response = self
            .transport
            .send(ApiEndpoint::StartCruise, &ApiRequest::one(cruise_id))
            .await;
        let Some(response) = response else {
            warn!(cruise_id, "No cruise data received");
            return;
        };

        {
            let mut cache = self.cache.write();
            if let Some(company) = response.get("company").and_then(|v| decode_record(v, "company")) {
                cache.add_company(company);
            }
            if let Some(ship) = response.get("ship").and_then(|v| decode_record(v, "ship")) {
                cache.add_ship(ship);
            }
        }

        self.ctx.stops.resolve(Arc::new(self.dictionary(
            response.get("stops-data"),
            LocationKind::Stop,
        )));
        for record in decode_collection::<LocationRecord>(response.get("sights-data"), "showplace") {
            if !record.id.is_empty() {
                self.ctx.showplaces.insert(Location::from_record(
                    record,
                    LocationKind::Showplace,
                    &self.config.site_url,
                ));
            }
        }
        self.ctx.gateways.resolve(Arc::new(self.dictionary(
            response.get("gateways"),
            LocationKind::Gateway,
        )));

        let Some(record) = decode_record::<CruiseRecord>(&response, "cruise") else {
            return;
        };
        let cruise = self.cache.write().add_cruise(record, &self.ctx);
        match cruise {
            Some(cruise) => info!(
                cruise_id,
                name = %cruise.name,
                stage = cruise.route_ready_stage(),
                "Cruise loaded"
            ),
            None => warn!(cruise_id, "Cruise data incomplete"),
        }
    }

    /// Loads a stops or places listing. No request means nothing to load.
    async fn start_locations(&self, kind: LocationKind, request: Option<ApiRequest>) {
        let Some(request) = request else {
            debug!(%kind, "No location ids requested");
            return;
        };

        let endpoint = match kind {
            LocationKind::Stop => ApiEndpoint::StartStops,
            _ => ApiEndpoint::StartSights,
        };
        let response = self.transport.send(endpoint, &request).await;
        let dictionary = self.dictionary(response.as_ref(), kind);
        info!(%kind, count = dictionary.len(), "Locations loaded");

        match kind {
            LocationKind::Stop => {
                self.ctx.stops.resolve(Arc::new(dictionary));
            }
            _ => {
                for location in dictionary.iter() {
                    self.ctx.showplaces.insert(Location::clone(location));
                }
            }
        }
    }

    async fn load_stops(&self) {
        let response = self.transport.send(ApiEndpoint::Stops, &ApiRequest::empty()).await;
        let dictionary = self.dictionary(response.as_ref(), LocationKind::Stop);
        info!(count = dictionary.len(), "Stops loaded");
        self.ctx.stops.resolve(Arc::new(dictionary));
    }

    async fn load_gateways(&self) {
        let response = self.transport.send(ApiEndpoint::Gateways, &ApiRequest::empty()).await;
        let dictionary = self.dictionary(response.as_ref(), LocationKind::Gateway);
        info!(count = dictionary.len(), "Gateways loaded");
        self.ctx.gateways.resolve(Arc::new(dictionary));
    }

    fn dictionary(&self, value: Option<&Value>, kind: LocationKind) -> LocationDictionary {
        let records: Vec<LocationRecord> = decode_collection(value, "location");
        LocationDictionary::from_records(records, kind, &self.config.site_url)
    }
}

fn list_request(ids: &[String]) -> Option<ApiRequest> {
    (!ids.is_empty()).then(|| ApiRequest::many(ids.to_vec()))
}

fn single_request(id: &str) -> Option<ApiRequest> {
    (!id.is_empty()).then(|| ApiRequest::one(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockApiClient;
    use crate::config::EngineConfig;
    use serde_json::json;

    fn engine(client: Arc<MockApiClient>) -> CruiseEngine {
        let config = EngineConfig::default().with_site_url("https://example.org");
        CruiseEngine::with_client(config, client)
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_cruise_mode() {
        let client = Arc::new(MockApiClient::new(|endpoint, body| {
            assert_eq!(endpoint, ApiEndpoint::StartCruise);
            assert_eq!(body["id"], "7");
            Ok(json!({
                "id": 7,
                "name": "Round trip",
                "departure": "2024-06-01 08:00:00",
                "arrival": "2024-06-03 20:00:00",
                "shipId": 3,
                "company": { "id": 1, "name": "Vodohod" },
                "ship": { "id": 3, "name": "Volga", "companyId": 1 },
                "stops": [{ "id": 11, "arrival": "2024-06-01 08:00:00" }],
                "stops-data": [{ "id": 11, "lat": 55.7, "lng": 37.6, "name": "Moscow", "url": "/stops/11" }],
                "sights-data": [{ "id": 21, "lat": 56.0, "lng": 38.0, "name": "Church", "category": "temple" }],
                "sights": [{ "id": 21, "arrival": "2024-06-01 12:00:00", "side": "left" }],
                "gateways": [{ "id": 31, "lat": 56.5, "lng": 38.5, "name": "Lock 1" }],
                "points": [
                    { "lat": 55.7, "lng": 37.6, "arrival": "2024-06-01 08:00:00", "isStop": true },
                    { "lat": 56.5, "lng": 38.5, "arrival": "2024-06-01 16:00:00", "gateway": 31 }
                ]
            }))
        }));
        let engine = engine(client.clone());

        engine.start(MapMode::Cruise("7".into())).await;

        assert!(engine.ready().is_resolved());
        let cruise = engine.cruise("7").unwrap();
        assert_eq!(cruise.route_ready_stage(), 4);
        assert_eq!(cruise.company().unwrap().name, "Vodohod");
        assert_eq!(engine.all_stops()[0].link.as_deref(), Some("https://example.org/stops/11"));

        assert_eq!(cruise.stops().await.len(), 1);
        let sights = cruise.sights().await;
        assert_eq!(sights.len(), 1);
        assert_eq!(sights[0].location.category.as_deref(), Some("temple"));
        let gateways = cruise.gateways().await;
        assert_eq!(gateways[0].location.name, "Lock 1");

        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_location_modes() {
        let client = Arc::new(MockApiClient::new(|endpoint, body| {
            Ok(match endpoint {
                ApiEndpoint::StartStops => json!([
                    { "id": 1, "lat": 1, "lng": 1, "name": "Uglich", "category": "ignored" }
                ]),
                ApiEndpoint::StartSights => {
                    assert_eq!(body["id"], "5");
                    json!([{ "id": 5, "lat": 2, "lng": 2, "name": "Kremlin", "category": "museum" }])
                }
                other => panic!("unexpected endpoint {other}"),
            })
        }));

        let stops = engine(client.clone());
        stops.start(MapMode::Stops(vec!["1".into()])).await;
        assert_eq!(stops.all_stops().len(), 1);
        assert_eq!(stops.all_stops()[0].category, None);
        assert!(stops.all_cruises().is_empty());

        let place = engine(client.clone());
        place.start(MapMode::SinglePlace("5".into())).await;
        assert_eq!(place.all_sights()[0].category.as_deref(), Some("museum"));
        assert!(place.gateways_loaded().is_resolved());

        let nothing = engine(client.clone());
        nothing.start(MapMode::Places(vec![])).await;
        assert!(nothing.all_sights().is_empty());
        assert!(nothing.ready().is_resolved());

        assert_eq!(client.calls().len(), 2);
    }
}

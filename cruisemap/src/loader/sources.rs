//! Fetch sources backed by the map API.

use std::collections::HashMap;
use std::sync::Arc;

use crate::api::records::{
    decode_batch_entry, decode_collection, LocationRecord, SightVisitRecord, TrackPointRecord,
};
use crate::api::{ApiEndpoint, ApiRequest, BoxFuture, Transport};
use crate::model::{Location, LocationKind};

use super::coalescer::BatchSource;
use super::queue::StageSource;

/// Stage at which batched geometry is requested.
pub const FIRST_STAGE: u8 = 1;

/// First-stage route geometry for a batch of cruises.
pub struct FirstStagePoints {
    transport: Transport,
}

impl FirstStagePoints {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

impl BatchSource<Arc<Vec<TrackPointRecord>>> for FirstStagePoints {
    fn fetch(&self, keys: Vec<String>) -> BoxFuture<'static, HashMap<String, Arc<Vec<TrackPointRecord>>>> {
        let transport = self.transport.clone();
        Box::pin(async move {
            let request = ApiRequest::many(keys.clone()).with_progress(FIRST_STAGE);
            let response = transport.send(ApiEndpoint::Points, &request).await;
            keys.into_iter()
                .map(|key| {
                    let points = decode_batch_entry(response.as_ref(), &key, "track point");
                    (key, Arc::new(points))
                })
                .collect()
        })
    }
}

/// Refinement stage geometry for one cruise.
pub struct StagePointsSource {
    transport: Transport,
}

impl StagePointsSource {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

impl StageSource for StagePointsSource {
    fn fetch_stage(&self, cruise_id: String, stage: u8) -> BoxFuture<'static, Vec<TrackPointRecord>> {
        let transport = self.transport.clone();
        Box::pin(async move {
            let request = ApiRequest::one(cruise_id.clone()).with_progress(stage);
            let response = transport.send(ApiEndpoint::Points, &request).await;
            decode_batch_entry(response.as_ref(), &cruise_id, "track point")
        })
    }
}

/// Showplace visits for a batch of cruises.
pub struct CruiseSights {
    transport: Transport,
}

impl CruiseSights {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

impl BatchSource<Arc<Vec<SightVisitRecord>>> for CruiseSights {
    fn fetch(&self, keys: Vec<String>) -> BoxFuture<'static, HashMap<String, Arc<Vec<SightVisitRecord>>>> {
        let transport = self.transport.clone();
        Box::pin(async move {
            let response = transport
                .send(ApiEndpoint::CruiseSights, &ApiRequest::many(keys.clone()))
                .await;
            keys.into_iter()
                .map(|key| {
                    let visits = decode_batch_entry(response.as_ref(), &key, "showplace visit");
                    (key, Arc::new(visits))
                })
                .collect()
        })
    }
}

/// Showplace records by id. The response is a flat array.
pub struct ShowplacesById {
    transport: Transport,
    site_url: String,
}

impl ShowplacesById {
    pub fn new(transport: Transport, site_url: impl Into<String>) -> Self {
        Self {
            transport,
            site_url: site_url.into(),
        }
    }
}

impl BatchSource<Option<Arc<Location>>> for ShowplacesById {
    fn fetch(&self, keys: Vec<String>) -> BoxFuture<'static, HashMap<String, Option<Arc<Location>>>> {
        let transport = self.transport.clone();
        let site_url = self.site_url.clone();
        Box::pin(async move {
            let response = transport
                .send(ApiEndpoint::SightsByIds, &ApiRequest::many(keys))
                .await;
            decode_collection::<LocationRecord>(response.as_ref(), "showplace")
                .into_iter()
                .filter(|record| !record.id.is_empty())
                .map(|record| {
                    let location = Location::from_record(record, LocationKind::Showplace, &site_url);
                    (location.id.clone(), Some(Arc::new(location)))
                })
                .collect()
        })
    }
}

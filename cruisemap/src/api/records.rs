//! Wire records exchanged with the map API.
//!
//! The backend is loose about scalar types: ids arrive as strings or numbers,
//! coordinates occasionally as numeric strings, flags as booleans or `0`/`1`.
//! The lenient deserializers here normalize all of that so the model layer
//! only ever sees one shape.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

// =============================================================================
// Requests
// =============================================================================

/// The `id` field of a request: one id or a batch of ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RequestId {
    One(String),
    Many(Vec<String>),
}

/// Request body accepted by every endpoint: `{id?, progress?}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

impl ApiRequest {
    /// Empty body (`{}`).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Body addressing a single id.
    pub fn one(id: impl Into<String>) -> Self {
        Self {
            id: Some(RequestId::One(id.into())),
            progress: None,
        }
    }

    /// Body addressing a batch of ids.
    pub fn many(ids: Vec<String>) -> Self {
        Self {
            id: Some(RequestId::Many(ids)),
            progress: None,
        }
    }

    /// Sets the route loading stage.
    pub fn with_progress(mut self, stage: u8) -> Self {
        self.progress = Some(stage);
        self
    }
}

// =============================================================================
// Records
// =============================================================================

/// Cruise company.
#[derive(Debug, Clone, Deserialize)]
pub struct CompanyRecord {
    #[serde(default, deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub name: String,
}

/// Ship.
#[derive(Debug, Clone, Deserialize)]
pub struct ShipRecord {
    #[serde(default, deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub name: String,
    #[serde(rename = "companyId", default, deserialize_with = "de_opt_id")]
    pub company_id: Option<String>,
}

/// Cruise as listed by `start` or returned by `start/cruise`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CruiseRecord {
    #[serde(default, deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub name: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub departure: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub arrival: Option<String>,
    #[serde(default, deserialize_with = "de_string")]
    pub departure_location_name: String,
    #[serde(default, deserialize_with = "de_string")]
    pub arrival_location_name: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub ship_id: Option<String>,
    #[serde(default, deserialize_with = "de_null_default")]
    pub stops: Vec<StopVisitRecord>,
    #[serde(default)]
    pub sights: Option<Vec<SightVisitRecord>>,
    #[serde(default)]
    pub points: Option<Vec<TrackPointRecord>>,
}

impl CruiseRecord {
    /// A cruise is usable only with a ship reference and both dates.
    pub fn is_sane(&self) -> bool {
        self.ship_id.is_some()
            && self.departure.as_deref().is_some_and(|s| !s.is_empty())
            && self.arrival.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Visit to a stop on a cruise.
#[derive(Debug, Clone, Deserialize)]
pub struct StopVisitRecord {
    #[serde(default, deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub arrival: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub departure: Option<String>,
}

/// Showplace passed on a cruise.
#[derive(Debug, Clone, Deserialize)]
pub struct SightVisitRecord {
    #[serde(default, deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub arrival: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub side: Option<String>,
}

/// Route point.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPointRecord {
    #[serde(deserialize_with = "de_f64")]
    pub lat: f64,
    #[serde(deserialize_with = "de_f64")]
    pub lng: f64,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub arrival: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub angle: Option<f64>,
    #[serde(default, deserialize_with = "de_flag")]
    pub is_stop: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub sunrise: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub sunset: bool,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub side: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub gateway: Option<String>,
}

/// Stop, showplace or gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationRecord {
    #[serde(default, deserialize_with = "de_id")]
    pub id: String,
    #[serde(deserialize_with = "de_f64")]
    pub lat: f64,
    #[serde(deserialize_with = "de_f64")]
    pub lng: f64,
    #[serde(default, deserialize_with = "de_string")]
    pub name: String,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub url: Option<String>,
}

// =============================================================================
// Response helpers
// =============================================================================

/// Decodes a single record, logging and dropping it if malformed.
pub fn decode_record<T: DeserializeOwned>(value: &Value, kind: &'static str) -> Option<T> {
    match T::deserialize(value) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!(kind, error = %e, "Skipping malformed record");
            None
        }
    }
}

/// Decodes a collection sent either as an array or as an object keyed by id.
///
/// Document order is preserved. Malformed entries are skipped.
pub fn decode_collection<T: DeserializeOwned>(value: Option<&Value>, kind: &'static str) -> Vec<T> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| decode_record(item, kind))
            .collect(),
        Some(Value::Object(map)) => map
            .values()
            .filter_map(|item| decode_record(item, kind))
            .collect(),
        _ => Vec::new(),
    }
}

/// Decodes the entry for `key` of a batched (keyed-by-id) response.
///
/// A missing response or a missing key both yield an empty list.
pub fn decode_batch_entry<T: DeserializeOwned>(
    response: Option<&Value>,
    key: &str,
    kind: &'static str,
) -> Vec<T> {
    decode_collection(response.and_then(|r| r.get(key)), kind)
}

// =============================================================================
// Lenient scalar deserializers
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Num(serde_json::Number),
    Bool(bool),
}

impl Scalar {
    fn into_id(self) -> Option<String> {
        match self {
            Scalar::Str(s) if !s.is_empty() => Some(s),
            Scalar::Num(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
            _ => None,
        }
    }

    fn into_string(self) -> String {
        match self {
            Scalar::Str(s) => s,
            Scalar::Num(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

fn de_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(de_opt_id(d)?.unwrap_or_default())
}

fn de_opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(d)?.and_then(Scalar::into_id))
}

fn de_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(de_opt_string(d)?.unwrap_or_default())
}

fn de_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(d)?.map(Scalar::into_string))
}

fn de_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Scalar>::deserialize(d)? {
        Some(Scalar::Num(n)) => n.as_f64(),
        Some(Scalar::Str(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn de_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    de_opt_f64(d)?.ok_or_else(|| serde::de::Error::custom("expected a number"))
}

fn de_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Option::<Scalar>::deserialize(d)? {
        Some(Scalar::Bool(b)) => b,
        Some(Scalar::Num(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Scalar::Str(s)) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
        None => false,
    })
}

fn de_null_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

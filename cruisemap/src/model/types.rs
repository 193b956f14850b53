//! Core entity and location types.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::api::records::{CompanyRecord, LocationRecord, TrackPointRecord};
use crate::index::Keyed;

use super::date::parse_opt_date;

// =============================================================================
// Companies and ships
// =============================================================================

/// Cruise company.
#[derive(Debug, Clone, PartialEq)]
pub struct Company {
    pub id: String,
    pub name: String,
    /// Marker color as `0xRRGGBB`.
    pub color: u32,
}

impl Company {
    pub fn from_record(record: CompanyRecord, color: u32) -> Self {
        Self {
            id: record.id,
            name: record.name,
            color,
        }
    }

    /// Color as a `#rrggbb` string.
    pub fn color_hex(&self) -> String {
        format!("#{:06x}", self.color)
    }
}

impl Keyed for Company {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Ship. The owning company is shared, not owned.
#[derive(Debug, Clone)]
pub struct Ship {
    pub id: String,
    pub name: String,
    pub company: Option<Arc<Company>>,
}

impl Ship {
    pub fn company_id(&self) -> Option<&str> {
        self.company.as_deref().map(|c| c.id.as_str())
    }
}

impl Keyed for Ship {
    fn id(&self) -> &str {
        &self.id
    }
}

// =============================================================================
// Locations
// =============================================================================

/// What a [`Location`] marks on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationKind {
    /// Regular stop (port of call).
    Stop,
    /// Showplace visible from the ship.
    Showplace,
    /// River gateway (lock).
    Gateway,
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LocationKind::Stop => "stop",
            LocationKind::Showplace => "showplace",
            LocationKind::Gateway => "gateway",
        };
        f.write_str(name)
    }
}

/// Stop, showplace or gateway. Shared between every cruise that visits it.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub id: String,
    pub kind: LocationKind,
    pub lat: f64,
    pub lng: f64,
    pub name: String,
    pub category: Option<String>,
    pub image: Option<String>,
    pub link: Option<String>,
}

impl Location {
    /// Builds a location, resolving relative image and page links against
    /// `site_url`. Gateways carry no links and only showplaces keep a category.
    pub fn from_record(record: LocationRecord, kind: LocationKind, site_url: &str) -> Self {
        let (image, link) = match kind {
            LocationKind::Gateway => (None, None),
            _ => (
                absolute_url(record.image.as_deref(), site_url),
                absolute_url(record.url.as_deref(), site_url),
            ),
        };
        Self {
            id: record.id,
            kind,
            lat: record.lat,
            lng: record.lng,
            name: record.name,
            category: match kind {
                LocationKind::Showplace => record.category,
                _ => None,
            },
            image,
            link,
        }
    }
}

/// Prefixes `site_url` onto a relative link. Empty links become `None`.
pub fn absolute_url(link: Option<&str>, site_url: &str) -> Option<String> {
    let link = link?.trim();
    if link.is_empty() {
        return None;
    }
    if link.starts_with("http://") || link.starts_with("https://") {
        Some(link.to_string())
    } else {
        Some(format!("{}{}", site_url.trim_end_matches('/'), link))
    }
}

/// Location dictionary keyed by id, iterated in load order.
#[derive(Debug, Default, Clone)]
pub struct LocationDictionary {
    order: Vec<Arc<Location>>,
    by_id: HashMap<String, Arc<Location>>,
}

impl LocationDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dictionary from wire records. Later duplicates replace earlier ones.
    pub fn from_records<I>(records: I, kind: LocationKind, site_url: &str) -> Self
    where
        I: IntoIterator<Item = LocationRecord>,
    {
        let mut dictionary = Self::new();
        for record in records {
            if !record.id.is_empty() {
                dictionary.insert(Location::from_record(record, kind, site_url));
            }
        }
        dictionary
    }

    pub fn insert(&mut self, location: Location) {
        let location = Arc::new(location);
        match self.by_id.insert(location.id.clone(), location.clone()) {
            Some(_) => {
                if let Some(slot) = self.order.iter_mut().find(|l| l.id == location.id) {
                    *slot = location;
                }
            }
            None => self.order.push(location),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Location>> {
        self.by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Location>> {
        self.order.iter()
    }

    pub fn to_vec(&self) -> Vec<Arc<Location>> {
        self.order.clone()
    }
}

// =============================================================================
// Track points
// =============================================================================

/// Side of the ship a showplace or sunrise is seen from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Case-insensitive `"left"` / `"right"`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Side::Left),
            "right" => Some(Side::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Left => "left",
            Side::Right => "right",
        })
    }
}

/// A point on a cruise route.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub lat: f64,
    pub lng: f64,
    pub arrival: DateTime<Utc>,
    pub is_stop: bool,
    /// Heading in degrees, within -180..=180.
    pub angle: Option<f64>,
    pub side: Option<Side>,
}

impl TrackPoint {
    /// Position of an idle ship: origin, not a stop.
    pub fn idle(at: DateTime<Utc>) -> Self {
        Self {
            lat: 0.0,
            lng: 0.0,
            arrival: at,
            is_stop: false,
            angle: None,
            side: None,
        }
    }

    /// Converts a wire point. Points without a parseable arrival are dropped.
    pub fn from_record(record: &TrackPointRecord) -> Option<Self> {
        let arrival = parse_opt_date(record.arrival.as_deref())?;
        Some(Self {
            lat: record.lat,
            lng: record.lng,
            arrival,
            is_stop: record.is_stop,
            angle: record.angle,
            side: None,
        })
    }
}

/// A location visited or passed on a cruise.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackLocation {
    pub arrival: DateTime<Utc>,
    pub departure: Option<DateTime<Utc>>,
    pub side: Option<Side>,
    pub location: Arc<Location>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, image: Option<&str>, url: Option<&str>) -> LocationRecord {
        LocationRecord {
            id: id.to_string(),
            lat: 56.0,
            lng: 38.0,
            name: format!("Location {}", id),
            category: Some("church".to_string()),
            image: image.map(str::to_string),
            url: url.map(str::to_string),
        }
    }

    #[test]
    fn test_absolute_url() {
        let site = "https://krubiss.ru";
        assert_eq!(
            absolute_url(Some("/stops/kazan"), site).as_deref(),
            Some("https://krubiss.ru/stops/kazan")
        );
        assert_eq!(
            absolute_url(Some("https://cdn.example.com/a.jpg"), site).as_deref(),
            Some("https://cdn.example.com/a.jpg")
        );
        assert_eq!(absolute_url(Some(""), site), None);
        assert_eq!(absolute_url(None, site), None);
    }

    #[test]
    fn test_location_from_record_by_kind() {
        let site = "https://krubiss.ru/";
        let showplace = Location::from_record(
            record("1", Some("/img/1.jpg"), None),
            LocationKind::Showplace,
            site,
        );
        assert_eq!(showplace.category.as_deref(), Some("church"));
        assert_eq!(showplace.image.as_deref(), Some("https://krubiss.ru/img/1.jpg"));

        let stop = Location::from_record(record("2", None, Some("/p")), LocationKind::Stop, site);
        assert_eq!(stop.category, None);
        assert_eq!(stop.link.as_deref(), Some("https://krubiss.ru/p"));

        let gateway = Location::from_record(record("3", Some("/x"), Some("/y")), LocationKind::Gateway, site);
        assert_eq!((gateway.image, gateway.link), (None, None));
    }

    #[test]
    fn test_dictionary_keeps_load_order_and_replaces() {
        let dictionary = LocationDictionary::from_records(
            vec![record("b", None, None), record("a", None, None), record("b", None, None), record("", None, None)],
            LocationKind::Stop,
            "",
        );
        let ids: Vec<_> = dictionary.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(dictionary.get("a").is_some());
        assert!(dictionary.get("").is_none());
    }

    #[test]
    fn test_side_parse() {
        assert_eq!(Side::parse("LEFT"), Some(Side::Left));
        assert_eq!(Side::parse(" right "), Some(Side::Right));
        assert_eq!(Side::parse(""), None);
    }

    #[test]
    fn test_company_color_hex() {
        let company = Company {
            id: "1".into(),
            name: "Test".into(),
            color: 0x31739D,
        };
        assert_eq!(company.color_hex(), "#31739d");
    }
}

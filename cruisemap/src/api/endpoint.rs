//! Map API endpoints.

use std::fmt;

/// Default base URL of the map API.
pub const DEFAULT_API_URL: &str = "https://krubiss.ru/api/map";

/// Default site URL used to absolutize relative links.
pub const DEFAULT_SITE_URL: &str = "https://krubiss.ru";

/// Endpoints exposed by the map API.
///
/// Every endpoint accepts a JSON `POST` relative to the API base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiEndpoint {
    /// Bulk listing of companies, ships and cruises.
    Start,
    /// Single cruise with its ship, company, locations and full route.
    StartCruise,
    /// Stops listed by id.
    StartStops,
    /// Showplaces listed by id.
    StartSights,
    /// Dictionary of all stops.
    Stops,
    /// Showplace visits keyed by cruise id.
    CruiseSights,
    /// Showplace records by id.
    SightsByIds,
    /// Dictionary of all gateways.
    Gateways,
    /// Route points keyed by cruise id, for a given loading stage.
    Points,
}

impl ApiEndpoint {
    /// Path relative to the API base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::StartCruise => "start/cruise",
            Self::StartStops => "start/stops",
            Self::StartSights => "start/sights",
            Self::Stops => "stops",
            Self::CruiseSights => "sights/byCruiseId",
            Self::SightsByIds => "sights/byIds",
            Self::Gateways => "gateways",
            Self::Points => "points",
        }
    }

    /// Full URL for this endpoint under `base_url`.
    pub fn url(self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.path())
    }
}

impl fmt::Display for ApiEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

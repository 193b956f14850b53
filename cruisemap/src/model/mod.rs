//! Domain model: companies, ships, cruises, locations and routes.

mod cruise;
mod date;
mod palette;
mod route;
mod types;

use std::cmp::Ordering;

pub use cruise::Cruise;
pub use date::{end_of_day, parse_date, parse_opt_date, start_of_day};
pub use palette::{Palette, BRAND_COLORS, DEFAULT_COMPANY_COLOR, PALETTE};
pub use route::{CruiseRoute, GatewayPass, RouteExtras};
pub use types::{
    absolute_url, Company, Location, LocationDictionary, LocationKind, Ship, Side, TrackLocation,
    TrackPoint,
};

/// Sort key for display names: lower-cased, punctuation and spaces ignored.
pub fn collation_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Orders names by [`collation_key`], falling back to the raw text.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}

/// Cruise order: departure, then arrival, then name.
pub fn compare_cruises(a: &Cruise, b: &Cruise) -> Ordering {
    a.departure
        .cmp(&b.departure)
        .then_with(|| a.arrival.cmp(&b.arrival))
        .then_with(|| compare_names(&a.name, &b.name))
}

//! Entity cache with a filtered view of active cruises.
//!
//! Companies and ships are sorted by name, cruises by departure, arrival and
//! name. The active view is a list of positions into the cruise index,
//! recomputed whenever the filter or the cruise set changes; every derived
//! list (ships, companies, navigation bounds) is computed from it.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::api::records::{CompanyRecord, CruiseRecord, ShipRecord};
use crate::index::SortedIndex;
use crate::loader::LoaderContext;
use crate::model::{
    compare_cruises, compare_names, end_of_day, start_of_day, Company, Cruise, Palette, Ship,
};

use super::filter::{CruiseFilter, FilterUpdate};

/// Companies, ships and cruises of one engine.
pub struct EntityCache {
    companies: SortedIndex<Arc<Company>>,
    ships: SortedIndex<Arc<Ship>>,
    cruises: SortedIndex<Arc<Cruise>>,
    active: Vec<usize>,
    filter: CruiseFilter,
    palette: Palette,
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityCache {
    pub fn new() -> Self {
        Self {
            companies: SortedIndex::new(|a: &Arc<Company>, b: &Arc<Company>| compare_names(&a.name, &b.name)),
            ships: SortedIndex::new(|a: &Arc<Ship>, b: &Arc<Ship>| compare_names(&a.name, &b.name)),
            cruises: SortedIndex::new(|a: &Arc<Cruise>, b: &Arc<Cruise>| compare_cruises(a, b)),
            active: Vec::new(),
            filter: CruiseFilter::default(),
            palette: Palette::new(),
        }
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Adds a company, assigning it the next palette color.
    pub fn add_company(&mut self, record: CompanyRecord) -> Option<Arc<Company>> {
        if record.id.is_empty() {
            debug!("Dropping company without id");
            return None;
        }
        let color = self.palette.color_for(&record.name);
        let company = Arc::new(Company::from_record(record, color));
        self.companies.add(company.clone());
        Some(company)
    }

    /// Adds a ship, linking it to an already known company.
    pub fn add_ship(&mut self, record: ShipRecord) -> Option<Arc<Ship>> {
        if record.id.is_empty() {
            debug!("Dropping ship without id");
            return None;
        }
        let company = record
            .company_id
            .as_deref()
            .and_then(|id| self.companies.item(id).cloned());
        let ship = Arc::new(Ship {
            id: record.id,
            name: record.name,
            company,
        });
        self.ships.add(ship.clone());
        Some(ship)
    }

    /// Adds cruises, dropping those without a known ship or valid dates, and
    /// refreshes the active view once.
    pub fn add_cruises<I>(&mut self, records: I, ctx: &Arc<LoaderContext>) -> usize
    where
        I: IntoIterator<Item = CruiseRecord>,
    {
        let mut added = 0;
        for record in records {
            if self.insert_cruise(record, ctx).is_some() {
                added += 1;
            }
        }
        self.refresh();
        added
    }

    /// Adds one cruise and refreshes the active view.
    pub fn add_cruise(&mut self, record: CruiseRecord, ctx: &Arc<LoaderContext>) -> Option<Arc<Cruise>> {
        let cruise = self.insert_cruise(record, ctx);
        self.refresh();
        cruise
    }

    fn insert_cruise(&mut self, record: CruiseRecord, ctx: &Arc<LoaderContext>) -> Option<Arc<Cruise>> {
        if record.id.is_empty() {
            debug!("Dropping cruise without id");
            return None;
        }
        let Some(ship) = record
            .ship_id
            .as_deref()
            .and_then(|id| self.ships.item(id).cloned())
        else {
            debug!(cruise_id = %record.id, ship_id = ?record.ship_id, "Dropping cruise of unknown ship");
            return None;
        };
        let cruise = Arc::new(Cruise::from_record(record, ship, ctx.clone())?);
        self.cruises.add(cruise.clone());
        Some(cruise)
    }

    // =========================================================================
    // Filter
    // =========================================================================

    /// Merges `update` into the filter and recomputes the active view.
    pub fn set_filter(&mut self, update: &FilterUpdate) {
        self.filter.apply(update);
        self.refresh();
    }

    pub fn filter(&self) -> &CruiseFilter {
        &self.filter
    }

    fn refresh(&mut self) {
        let filter = &self.filter;
        self.active = self
            .cruises
            .iter()
            .enumerate()
            .filter(|(_, cruise)| filter.matches(cruise))
            .map(|(position, _)| position)
            .collect();
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn company(&self, id: &str) -> Option<Arc<Company>> {
        self.companies.item(id).cloned()
    }

    pub fn ship(&self, id: &str) -> Option<Arc<Ship>> {
        self.ships.item(id).cloned()
    }

    pub fn cruise(&self, id: &str) -> Option<Arc<Cruise>> {
        self.cruises.item(id).cloned()
    }

    /// Every cruise, ignoring the filter.
    pub fn cruise_count(&self) -> usize {
        self.cruises.len()
    }

    // =========================================================================
    // Active view
    // =========================================================================

    fn active_cruises(&self) -> impl Iterator<Item = &Arc<Cruise>> + '_ {
        self.active.iter().filter_map(|&position| self.cruises.at(position))
    }

    /// Cruises passing the filter, in cruise order.
    pub fn all_cruises(&self) -> Vec<Arc<Cruise>> {
        self.active_cruises().cloned().collect()
    }

    /// Ships with at least one active cruise, in name order.
    pub fn all_ships(&self) -> Vec<Arc<Ship>> {
        let ids: HashSet<&str> = self.active_cruises().map(|c| c.ship.id.as_str()).collect();
        self.ships
            .iter()
            .filter(|ship| ids.contains(ship.id.as_str()))
            .cloned()
            .collect()
    }

    /// Companies owning a ship with an active cruise, in name order.
    pub fn all_companies(&self) -> Vec<Arc<Company>> {
        let ids: HashSet<&str> = self
            .active_cruises()
            .filter_map(|c| c.ship.company_id())
            .collect();
        self.companies
            .iter()
            .filter(|company| ids.contains(company.id.as_str()))
            .cloned()
            .collect()
    }

    /// Start of the day of the earliest active departure.
    pub fn navigation_start_date(&self) -> Option<DateTime<Utc>> {
        self.active_cruises().map(|c| c.departure).min().map(start_of_day)
    }

    /// End of the day of the latest active arrival.
    pub fn navigation_end_date(&self) -> Option<DateTime<Utc>> {
        self.active_cruises().map(|c| c.arrival).max().map(end_of_day)
    }

    /// Active cruises of a company.
    pub fn company_cruises(&self, company_id: &str) -> Vec<Arc<Cruise>> {
        self.active_cruises()
            .filter(|c| c.ship.company_id() == Some(company_id))
            .cloned()
            .collect()
    }

    /// Ships of a company with an active cruise, in name order.
    pub fn company_ships(&self, company_id: &str) -> Vec<Arc<Ship>> {
        let ids: HashSet<&str> = self
            .active_cruises()
            .filter(|c| c.ship.company_id() == Some(company_id))
            .map(|c| c.ship.id.as_str())
            .collect();
        self.ships
            .iter()
            .filter(|ship| ids.contains(ship.id.as_str()))
            .cloned()
            .collect()
    }

    /// Active cruises of a ship.
    pub fn ship_cruises(&self, ship_id: &str) -> Vec<Arc<Cruise>> {
        self.active_cruises()
            .filter(|c| c.ship.id == ship_id)
            .cloned()
            .collect()
    }

    /// Start of the day of the ship's first active departure.
    pub fn ship_navigation_start(&self, ship_id: &str) -> Option<DateTime<Utc>> {
        self.active_cruises()
            .filter(|c| c.ship.id == ship_id)
            .map(|c| c.departure)
            .min()
            .map(start_of_day)
    }

    /// End of the day of the ship's last active arrival.
    pub fn ship_navigation_end(&self, ship_id: &str) -> Option<DateTime<Utc>> {
        self.active_cruises()
            .filter(|c| c.ship.id == ship_id)
            .map(|c| c.arrival)
            .max()
            .map(end_of_day)
    }

    /// Cruises of a ship relevant at `at`.
    ///
    /// Cruises in progress at `at`; failing that, cruises departing later the
    /// same day; failing that, cruises that arrived earlier the same day.
    pub fn cruises_on(&self, ship_id: &str, at: DateTime<Utc>) -> Vec<Arc<Cruise>> {
        let day_start = start_of_day(at);
        let day_end = end_of_day(at);
        let mut found = Vec::new();
        let mut departing = Vec::new();
        let mut arrived = Vec::new();

        for cruise in self.active_cruises().filter(|c| c.ship.id == ship_id) {
            if cruise.is_in_progress_at(at) {
                found.push(cruise.clone());
            } else if day_start <= cruise.departure && cruise.departure <= day_end {
                departing.push(cruise.clone());
            } else if day_start <= cruise.arrival && cruise.arrival <= day_end {
                arrived.push(cruise.clone());
            }
        }

        if !found.is_empty() {
            found
        } else if !departing.is_empty() {
            departing
        } else {
            arrived
        }
    }

    /// The cruise of a ship at `at`: the earliest departure among
    /// [`cruises_on`](Self::cruises_on), the longest one on equal departures.
    pub fn cruise_on(&self, ship_id: &str, at: DateTime<Utc>) -> Option<Arc<Cruise>> {
        let cruises = self.cruises_on(ship_id, at);
        let first = cruises.first()?;
        let mut chosen = 0;
        while chosen + 1 < cruises.len() && cruises[chosen + 1].departure == first.departure {
            chosen += 1;
        }
        cruises.get(chosen).cloned()
    }
}

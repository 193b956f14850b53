//! Cruise filter state.
//!
//! The filter is persistent: a [`FilterUpdate`] only touches the fields it
//! names. An empty name or a `None` date clears that field.

use chrono::{DateTime, Utc};

use crate::model::Cruise;

/// Current filter of the active cruise view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CruiseFilter {
    /// Lower-cased company name substring.
    pub company_name: Option<String>,
    /// Lower-cased ship name substring.
    pub ship_name: Option<String>,
    /// Cruises must depart at or after this.
    pub start_date: Option<DateTime<Utc>>,
    /// Cruises must arrive at or before this.
    pub end_date: Option<DateTime<Utc>>,
}

/// Partial filter change. Fields left unset keep their current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterUpdate {
    company_name: Option<Option<String>>,
    ship_name: Option<Option<String>>,
    start_date: Option<Option<DateTime<Utc>>>,
    end_date: Option<Option<DateTime<Utc>>>,
}

impl FilterUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by company name substring; empty clears.
    pub fn company_name(mut self, name: impl Into<String>) -> Self {
        self.company_name = Some(normalize(name.into()));
        self
    }

    /// Filter by ship name substring; empty clears.
    pub fn ship_name(mut self, name: impl Into<String>) -> Self {
        self.ship_name = Some(normalize(name.into()));
        self
    }

    /// Earliest departure; `None` clears.
    pub fn start_date(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.start_date = Some(date);
        self
    }

    /// Latest arrival; `None` clears.
    pub fn end_date(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.end_date = Some(date);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn normalize(name: String) -> Option<String> {
    let name = name.trim().to_lowercase();
    (!name.is_empty()).then_some(name)
}

impl CruiseFilter {
    /// Merges `update` into the filter.
    pub fn apply(&mut self, update: &FilterUpdate) {
        if let Some(name) = &update.company_name {
            self.company_name = name.clone();
        }
        if let Some(name) = &update.ship_name {
            self.ship_name = name.clone();
        }
        if let Some(date) = update.start_date {
            self.start_date = date;
        }
        if let Some(date) = update.end_date {
            self.end_date = date;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, cruise: &Cruise) -> bool {
        self.matches_parts(
            cruise.company().map(|c| c.name.as_str()),
            &cruise.ship.name,
            Some(cruise.departure),
            Some(cruise.arrival),
        )
    }

    /// Name filters are alternatives; date bounds must both hold. A missing
    /// date fails any active date bound.
    pub fn matches_parts(
        &self,
        company_name: Option<&str>,
        ship_name: &str,
        departure: Option<DateTime<Utc>>,
        arrival: Option<DateTime<Utc>>,
    ) -> bool {
        if self.company_name.is_some() || self.ship_name.is_some() {
            let company_hit = match (&self.company_name, company_name) {
                (Some(needle), Some(name)) => name.to_lowercase().contains(needle.as_str()),
                _ => false,
            };
            let ship_hit = self
                .ship_name
                .as_ref()
                .is_some_and(|needle| ship_name.to_lowercase().contains(needle.as_str()));
            if !company_hit && !ship_hit {
                return false;
            }
        }

        if let Some(start) = self.start_date {
            if !departure.is_some_and(|departure| departure >= start) {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if !arrival.is_some_and(|arrival| arrival <= end) {
                return false;
            }
        }
        true
    }
}

//! Output helpers shared across CLI commands.

use chrono::{DateTime, Utc};
use cruisemap::model::{Cruise, Location, TrackPoint};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn format_time(t: DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

/// One-line cruise summary: id, dates, ship, company and name.
pub fn cruise_line(cruise: &Cruise) -> String {
    let company = cruise.company().map(|c| c.name.as_str()).unwrap_or("-");
    format!(
        "{:<8} {} -> {}  {:<16} {:<16} {}",
        cruise.id,
        format_time(cruise.departure),
        format_time(cruise.arrival),
        cruise.ship.name,
        company,
        cruise.name
    )
}

pub fn location_line(location: &Location) -> String {
    let mut line = format!(
        "{:<8} {:>9.5} {:>10.5}  {}",
        location.id, location.lat, location.lng, location.name
    );
    if let Some(category) = &location.category {
        line.push_str(&format!(" [{}]", category));
    }
    if let Some(link) = &location.link {
        line.push_str(&format!("  {}", link));
    }
    line
}

pub fn position_line(point: &TrackPoint) -> String {
    let mut line = format!("{:.5}, {:.5} at {}", point.lat, point.lng, format_time(point.arrival));
    if let Some(angle) = point.angle {
        line.push_str(&format!(", heading {:.0}°", angle));
    }
    if point.is_stop {
        line.push_str(" (at stop)");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use cruisemap::model::LocationKind;

    #[test]
    fn test_position_line() {
        let point = TrackPoint {
            lat: 55.75,
            lng: 37.6,
            arrival: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
            is_stop: true,
            angle: Some(45.0),
            side: None,
        };
        assert_eq!(
            position_line(&point),
            "55.75000, 37.60000 at 2024-06-01 08:00, heading 45° (at stop)"
        );
    }

    #[test]
    fn test_location_line_includes_category_and_link() {
        let location = Location {
            id: "5".into(),
            kind: LocationKind::Showplace,
            lat: 1.0,
            lng: 2.0,
            name: "Kremlin".into(),
            category: Some("museum".into()),
            image: None,
            link: Some("https://example.org/5".into()),
        };
        let line = location_line(&location);
        assert!(line.ends_with("Kremlin [museum]  https://example.org/5"));
    }
}

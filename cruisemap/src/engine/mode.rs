//! What the map shows.

use std::fmt;

/// Map mode selected when the engine starts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MapMode {
    /// Every cruise of every company.
    #[default]
    Fleet,
    /// One cruise, loaded with its complete route.
    Cruise(String),
    /// A list of stops.
    Stops(Vec<String>),
    /// One stop.
    SingleStop(String),
    /// A list of showplaces.
    Places(Vec<String>),
    /// One showplace.
    SinglePlace(String),
}

impl MapMode {
    /// Parses a mode name with its entity ids (comma separated for lists).
    ///
    /// Unknown names select [`MapMode::Fleet`].
    pub fn parse(name: &str, ids: &str) -> Self {
        let list = || -> Vec<String> {
            ids.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect()
        };
        match name {
            "cruise" => MapMode::Cruise(ids.trim().to_string()),
            "stops" => MapMode::Stops(list()),
            "single-stop" => MapMode::SingleStop(ids.trim().to_string()),
            "places" => MapMode::Places(list()),
            "single-place" => MapMode::SinglePlace(ids.trim().to_string()),
            _ => MapMode::Fleet,
        }
    }

    /// Whether this mode loads cruises.
    pub fn has_cruises(&self) -> bool {
        matches!(self, MapMode::Fleet | MapMode::Cruise(_))
    }
}

impl fmt::Display for MapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapMode::Fleet => f.write_str("fleet"),
            MapMode::Cruise(id) => write!(f, "cruise {}", id),
            MapMode::Stops(ids) => write!(f, "stops [{}]", ids.join(",")),
            MapMode::SingleStop(id) => write!(f, "stop {}", id),
            MapMode::Places(ids) => write!(f, "places [{}]", ids.join(",")),
            MapMode::SinglePlace(id) => write!(f, "place {}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(MapMode::parse("cruise", " 42 "), MapMode::Cruise("42".into()));
        assert_eq!(
            MapMode::parse("stops", "1, 2,,3"),
            MapMode::Stops(vec!["1".into(), "2".into(), "3".into()])
        );
        assert_eq!(MapMode::parse("places", ""), MapMode::Places(vec![]));
        assert_eq!(MapMode::parse("default", "ignored"), MapMode::Fleet);
    }

    #[test]
    fn test_display() {
        assert_eq!(MapMode::Stops(vec!["1".into(), "2".into()]).to_string(), "stops [1,2]");
        assert_eq!(MapMode::Fleet.to_string(), "fleet");
    }
}

//! Cruise route geometry and position interpolation.
//!
//! A [`CruiseRoute`] is a list of [`TrackPoint`]s ordered by arrival time.
//! Duplicate arrivals are allowed: a ship standing at a stop is sampled several
//! times with the same timestamp, and refined loading stages add points that
//! may coincide with existing ones.
//!
//! # Example
//!
//! ```ignore
//! let route = CruiseRoute::new(points);
//! let position = route.position_at(Utc::now());
//! println!("{:.4}, {:.4} heading {:?}", position.lat, position.lng, position.angle);
//! ```

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::api::records::TrackPointRecord;

use super::types::{Side, TrackPoint};

/// Ordered-by-arrival sequence of track points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CruiseRoute {
    points: Vec<TrackPoint>,
}

/// A gateway passed on the route, not yet resolved against the dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPass {
    pub arrival: DateTime<Utc>,
    pub gateway_id: String,
}

/// Markers collected while parsing the first route stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteExtras {
    pub sunrises: Vec<TrackPoint>,
    pub sunsets: Vec<TrackPoint>,
    pub gateways: Vec<GatewayPass>,
}

impl CruiseRoute {
    /// Creates a route. `points` must already be ordered by arrival.
    pub fn new(points: Vec<TrackPoint>) -> Self {
        Self { points }
    }

    /// Parses first-stage wire points into a route plus its sunrise, sunset
    /// and gateway markers.
    pub fn from_records(records: &[TrackPointRecord]) -> (Self, RouteExtras) {
        let mut extras = RouteExtras::default();
        let mut points = Vec::with_capacity(records.len());

        for record in records {
            let Some(mut point) = TrackPoint::from_record(record) else {
                continue;
            };
            if record.sunrise || record.sunset {
                point.side = record.side.as_deref().and_then(Side::parse);
            }
            if record.sunrise {
                extras.sunrises.push(point.clone());
            }
            if record.sunset {
                extras.sunsets.push(point.clone());
            }
            if let Some(gateway_id) = &record.gateway {
                extras.gateways.push(GatewayPass {
                    arrival: point.arrival,
                    gateway_id: gateway_id.clone(),
                });
            }
            points.push(point);
        }

        (Self::new(points), extras)
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Merges refinement points into the route.
    ///
    /// Incoming points are ordered by arrival, then each is inserted after
    /// every existing point with an arrival not later than its own, scanning
    /// forward from the previous insertion. Existing points keep their
    /// relative order.
    ///
    /// Returns the number of points merged.
    pub fn merge_points(&mut self, mut incoming: Vec<TrackPoint>) -> usize {
        incoming.sort_by(|a, b| a.arrival.cmp(&b.arrival));
        let count = incoming.len();

        let mut index = 0;
        for point in incoming {
            while index < self.points.len() && self.points[index].arrival <= point.arrival {
                index += 1;
            }
            self.points.insert(index, point);
        }

        count
    }

    /// Merges refinement points straight from the wire.
    ///
    /// Refinement points are never stops.
    pub fn merge_records(&mut self, records: &[TrackPointRecord]) -> usize {
        let incoming = records
            .iter()
            .filter_map(TrackPoint::from_record)
            .map(|mut point| {
                point.is_stop = false;
                point
            })
            .collect();
        self.merge_points(incoming)
    }

    /// Position of the ship at `at`.
    ///
    /// - empty route: origin, flagged as a stop
    /// - exact timestamp match: the matching point itself (see below for ties)
    /// - before the first point: the first point
    /// - after the last point: the last point
    /// - otherwise: linear interpolation between the surrounding points
    ///
    /// On an exact match among several points with the same arrival, a stop
    /// at or after the matched point wins, then the nearest stop before it,
    /// then the first point of the run.
    pub fn position_at(&self, at: DateTime<Utc>) -> TrackPoint {
        let points = &self.points;
        if points.is_empty() {
            return TrackPoint {
                lat: 0.0,
                lng: 0.0,
                arrival: at,
                is_stop: true,
                angle: None,
                side: None,
            };
        }

        let last = points.len() - 1;
        let mut lo = 0usize;
        let mut hi = points.len();
        let mut previous: Option<usize> = None;
        while lo < hi {
            let mid = lo + (hi - 1 - lo) / 2;
            match points[mid].arrival.cmp(&at) {
                Ordering::Equal => return points[self.resolve_exact(mid)].clone(),
                Ordering::Less => {
                    previous = Some(mid);
                    lo = mid + 1;
                }
                Ordering::Greater => hi = mid,
            }
        }

        let Some(mut previous) = previous else {
            return points[0].clone();
        };
        while previous < last && points[previous + 1].arrival <= points[previous].arrival {
            previous += 1;
        }
        if previous >= last {
            return points[last].clone();
        }

        let from = &points[previous];
        let to = &points[previous + 1];
        let frac = millis(at - from.arrival) / millis(to.arrival - from.arrival);

        TrackPoint {
            lat: from.lat * (1.0 - frac) + to.lat * frac,
            lng: from.lng * (1.0 - frac) + to.lng * frac,
            arrival: at,
            is_stop: from.is_stop || to.is_stop,
            angle: interpolate_angle(from, to, frac),
            side: None,
        }
    }

    /// Tie-break among points sharing the matched arrival.
    fn resolve_exact(&self, matched: usize) -> usize {
        let points = &self.points;
        let mut index = matched;
        while index < points.len() - 1
            && !points[index].is_stop
            && points[index].arrival >= points[index + 1].arrival
        {
            index += 1;
        }
        while index > 0 && !points[index].is_stop && points[index].arrival <= points[index - 1].arrival {
            index -= 1;
        }
        index
    }
}

/// Heading between two points.
///
/// Both headings known and neither point a stop: rotate along the shortest
/// arc. Otherwise, when neither point is a stop, take whichever heading is
/// known.
fn interpolate_angle(from: &TrackPoint, to: &TrackPoint, frac: f64) -> Option<f64> {
    if from.is_stop || to.is_stop {
        return None;
    }
    match (from.angle, to.angle) {
        (Some(a), Some(b)) => {
            let rotation = normalize_angle(b - a) * frac;
            Some(normalize_angle(a + rotation))
        }
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// Folds an angle into -180..=180 with a single ±360 step.
fn normalize_angle(angle: f64) -> f64 {
    if angle > 180.0 {
        angle - 360.0
    } else if angle < -180.0 {
        angle + 360.0
    } else {
        angle
    }
}

fn millis(delta: chrono::Duration) -> f64 {
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1000.0,
        None => delta.num_milliseconds() as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn point(seconds: i64, lat: f64, lng: f64, angle: Option<f64>) -> TrackPoint {
        TrackPoint {
            lat,
            lng,
            arrival: t(seconds),
            is_stop: false,
            angle,
            side: None,
        }
    }

    fn stop(seconds: i64, lat: f64) -> TrackPoint {
        TrackPoint {
            is_stop: true,
            ..point(seconds, lat, lat, None)
        }
    }

    #[test]
    fn test_empty_route() {
        let route = CruiseRoute::default();
        let position = route.position_at(t(42));
        assert_eq!((position.lat, position.lng), (0.0, 0.0));
        assert!(position.is_stop);
        assert_eq!(position.arrival, t(42));
    }

    #[test]
    fn test_interpolates_lat_lng_and_angle() {
        let route = CruiseRoute::new(vec![
            point(100, 0.0, 0.0, Some(0.0)),
            point(200, 10.0, 10.0, Some(170.0)),
        ]);

        let position = route.position_at(t(150));
        assert!((position.lat - 5.0).abs() < 1e-9);
        assert!((position.lng - 5.0).abs() < 1e-9);
        assert!((position.angle.unwrap() - 85.0).abs() < 1e-9);
        assert!(!position.is_stop);
        assert_eq!(position.arrival, t(150));
    }

    #[test]
    fn test_angle_takes_shortest_arc() {
        let route = CruiseRoute::new(vec![
            point(0, 0.0, 0.0, Some(170.0)),
            point(100, 0.0, 0.0, Some(-170.0)),
        ]);

        // 170 -> -170 is a 20 degree turn through 180
        let position = route.position_at(t(75));
        assert!((position.angle.unwrap() - (-175.0)).abs() < 1e-9);
    }

    #[test]
    fn test_angle_single_endpoint_fallback() {
        let route = CruiseRoute::new(vec![point(0, 0.0, 0.0, None), point(10, 1.0, 1.0, Some(45.0))]);
        assert_eq!(route.position_at(t(5)).angle, Some(45.0));

        let with_stop = CruiseRoute::new(vec![stop(0, 0.0), point(10, 1.0, 1.0, Some(45.0))]);
        let position = with_stop.position_at(t(5));
        assert_eq!(position.angle, None);
        assert!(position.is_stop);
    }

    #[test]
    fn test_before_first_and_after_last() {
        let route = CruiseRoute::new(vec![point(100, 1.0, 1.0, None), point(200, 2.0, 2.0, None)]);
        assert_eq!(route.position_at(t(50)), route.points()[0]);
        assert_eq!(route.position_at(t(500)), route.points()[1]);
    }

    #[test]
    fn test_skips_duplicate_previous() {
        let route = CruiseRoute::new(vec![
            point(100, 0.0, 0.0, None),
            point(200, 1.0, 1.0, None),
            point(200, 2.0, 2.0, None),
            point(300, 4.0, 4.0, None),
        ]);

        // interpolates from the last point sharing t=200
        let position = route.position_at(t(250));
        assert!((position.lat - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_exact_match_prefers_stop_in_run() {
        let route = CruiseRoute::new(vec![
            point(100, 0.0, 0.0, None),
            point(200, 1.0, 1.0, None),
            stop(200, 2.0),
            point(200, 3.0, 3.0, None),
            point(300, 4.0, 4.0, None),
        ]);

        let position = route.position_at(t(200));
        assert!(position.is_stop);
        assert_eq!(position.lat, 2.0);
    }

    #[test]
    fn test_exact_match_among_stops_takes_first_found() {
        let route = CruiseRoute::new(vec![
            point(100, 0.0, 0.0, None),
            stop(200, 1.0),
            stop(200, 2.0),
            point(300, 3.0, 3.0, None),
        ]);

        let position = route.position_at(t(200));
        assert!(position.is_stop);
        assert_eq!(position.lat, 1.0);
    }

    #[test]
    fn test_exact_match_without_stop_returns_first_of_run() {
        let route = CruiseRoute::new(vec![
            point(200, 1.0, 1.0, None),
            point(200, 2.0, 2.0, None),
            point(200, 3.0, 3.0, None),
        ]);

        assert_eq!(route.position_at(t(200)).lat, 1.0);
    }

    #[test]
    fn test_parse_collects_extras() {
        let records: Vec<TrackPointRecord> = serde_json::from_value(serde_json::json!([
            {"lat": 1, "lng": 1, "arrival": "2024-06-01 10:00:00", "sunrise": 1, "side": "Left"},
            {"lat": 2, "lng": 2, "arrival": "2024-06-01 11:00:00", "gateway": "g7"},
            {"lat": 3, "lng": 3, "arrival": "not a date"},
            {"lat": 4, "lng": 4, "arrival": "2024-06-01 21:00:00", "sunset": true, "isStop": 1}
        ]))
        .unwrap();

        let (route, extras) = CruiseRoute::from_records(&records);
        assert_eq!(route.len(), 3);
        assert_eq!(route.points()[0].side, Some(Side::Left));
        assert_eq!(extras.sunrises.len(), 1);
        assert_eq!(extras.sunsets.len(), 1);
        assert!(extras.sunsets[0].is_stop);
        assert_eq!(extras.gateways[0].gateway_id, "g7");
    }

    #[test]
    fn test_merge_equal_arrivals_go_after_existing() {
        let mut route = CruiseRoute::new(vec![point(100, 0.0, 0.0, None), point(200, 1.0, 1.0, None)]);
        route.merge_points(vec![point(200, 9.0, 9.0, None), point(150, 5.0, 5.0, None)]);

        let lats: Vec<f64> = route.points().iter().map(|p| p.lat).collect();
        assert_eq!(lats, vec![0.0, 5.0, 1.0, 9.0]);
    }

    #[test]
    fn test_merge_records_are_never_stops() {
        let mut route = CruiseRoute::new(vec![point(0, 0.0, 0.0, None)]);
        let records: Vec<TrackPointRecord> = serde_json::from_value(serde_json::json!([
            {"lat": 1, "lng": 1, "arrival": "1970-01-01 00:00:10", "isStop": true, "angle": 30}
        ]))
        .unwrap();

        assert_eq!(route.merge_records(&records), 1);
        assert!(!route.points()[1].is_stop);
        assert_eq!(route.points()[1].angle, Some(30.0));
    }

    fn arrivals_strategy() -> impl Strategy<Value = Vec<i64>> {
        prop::collection::vec(0i64..50, 0..40).prop_map(|mut v| {
            v.sort();
            v
        })
    }

    proptest! {
        #[test]
        fn prop_merge_keeps_order(
            existing in arrivals_strategy(),
            incoming in prop::collection::vec(0i64..50, 0..40),
        ) {
            let mut route = CruiseRoute::new(
                existing.iter().enumerate().map(|(i, &s)| point(s, i as f64, 0.0, None)).collect(),
            );
            route.merge_points(incoming.iter().map(|&s| point(s, -1.0, 0.0, None)).collect());

            prop_assert_eq!(route.len(), existing.len() + incoming.len());
            for pair in route.points().windows(2) {
                prop_assert!(pair[0].arrival <= pair[1].arrival);
            }
            let kept: Vec<f64> = route.points().iter().map(|p| p.lat).filter(|&lat| lat >= 0.0).collect();
            let expected: Vec<f64> = (0..existing.len()).map(|i| i as f64).collect();
            prop_assert_eq!(kept, expected);
        }

        #[test]
        fn prop_exact_unique_arrival_is_idempotent(
            gaps in prop::collection::vec(1i64..100, 1..30),
            pick in any::<prop::sample::Index>(),
        ) {
            let mut at = 0;
            let points: Vec<TrackPoint> = gaps
                .iter()
                .enumerate()
                .map(|(i, gap)| {
                    at += gap;
                    point(at, i as f64, (i * 2) as f64, Some(i as f64))
                })
                .collect();
            let route = CruiseRoute::new(points.clone());
            let target = &points[pick.index(points.len())];

            prop_assert_eq!(&route.position_at(target.arrival), target);
        }

        #[test]
        fn prop_dense_stop_sampling_resolves_within_run(
            run in prop::collection::vec(any::<bool>(), 1..12),
        ) {
            // A run of samples sharing t=100, some of them stops, framed by
            // moving points.
            let mut points = vec![point(50, -1.0, 0.0, None)];
            for (i, &is_stop) in run.iter().enumerate() {
                let mut p = point(100, i as f64, 0.0, None);
                p.is_stop = is_stop;
                points.push(p);
            }
            points.push(point(150, -2.0, 0.0, None));
            let route = CruiseRoute::new(points);

            // The search over [moving, run.., moving] lands on the lower middle.
            let matched = (run.len() + 1) / 2;
            let expected = match run[matched - 1..].iter().position(|&s| s) {
                Some(offset) => matched - 1 + offset,
                None => match run.iter().rposition(|&s| s) {
                    Some(last_stop) => last_stop,
                    None => 0,
                },
            };

            let position = route.position_at(t(100));
            prop_assert_eq!(position.arrival, t(100));
            prop_assert_eq!(position.lat, expected as f64);
            prop_assert_eq!(position.is_stop, run.iter().any(|&s| s));
        }
    }
}

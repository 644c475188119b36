//! Off-route detection with reroute suppression.
//!
//! The user is compared against the current and next route segment. Once a
//! reroute has been triggered, deviation is held back for a fixed window so
//! a user standing just off the route does not cause a reroute storm. The
//! window is a deadline checked on the next evaluation; nothing is scheduled.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::NavigationConfig;
use crate::geo::Coordinate;
use crate::routing::Route;

/// Number of segments, starting at the current one, checked for deviation
const LOOKAHEAD_SEGMENTS: usize = 2;

/// Result of one off-route evaluation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OffRouteSignal {
    OnTrack,
    /// Beyond tolerance; `distance_m` is infinite when the user's floor has
    /// no part of the checked segments
    Deviated { distance_m: f64 },
}

impl OffRouteSignal {
    pub fn is_deviated(&self) -> bool {
        matches!(self, OffRouteSignal::Deviated { .. })
    }
}

/// Off-route detector for one navigation session.
#[derive(Clone, Debug)]
pub struct OffRouteDetector {
    tolerance_m: f64,
    window: Duration,
    suppressed_until: Option<Instant>,
}

impl OffRouteDetector {
    pub fn new(tolerance_m: f64, window: Duration) -> Self {
        Self {
            tolerance_m,
            window,
            suppressed_until: None,
        }
    }

    pub fn from_config(config: &NavigationConfig) -> Self {
        Self::new(config.off_route_tolerance_m, config.suppression_window())
    }

    pub fn tolerance_m(&self) -> f64 {
        self.tolerance_m
    }

    /// Compare `position` with segments `current_index` and `current_index + 1`.
    pub fn evaluate(&self, position: &Coordinate, route: &Route, current_index: usize, now: Instant) -> OffRouteSignal {
        let distance_m = route
            .distance_to_segments(position, current_index, LOOKAHEAD_SEGMENTS)
            .unwrap_or(f64::INFINITY);

        if distance_m <= self.tolerance_m {
            return OffRouteSignal::OnTrack;
        }
        if self.is_suppressed(now) {
            debug!("Deviation of {:.1}m suppressed", distance_m);
            return OffRouteSignal::OnTrack;
        }
        OffRouteSignal::Deviated { distance_m }
    }

    /// Hold back deviation until `now + window`.
    pub fn suppress(&mut self, now: Instant) {
        let until = now + self.window;
        debug!("Reroute suppression armed for {:?}", self.window);
        self.suppressed_until = Some(until);
    }

    /// Check if the suppression window is still open at `now`
    pub fn is_suppressed(&self, now: Instant) -> bool {
        self.suppressed_until.is_some_and(|until| now < until)
    }

    /// Suppression deadline, if armed
    pub fn suppressed_until(&self) -> Option<Instant> {
        self.suppressed_until
    }

    pub fn clear_suppression(&mut self) {
        self.suppressed_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{PathPoint, SegmentBuilder};

    // ~1.11m per 1e-5 degrees at the equator
    const M: f64 = 1e-5 / 1.1132;

    fn straight_route() -> Route {
        let path: Vec<PathPoint> = (0..=10)
            .map(|i| PathPoint {
                coordinate: Coordinate::new(0.0, i as f64 * 10.0 * M, 0),
                section: None,
                via: None,
            })
            .collect();
        SegmentBuilder::new(35.0).build(&path, None).unwrap()
    }

    fn detector() -> OffRouteDetector {
        OffRouteDetector::new(10.0, Duration::from_secs(5))
    }

    #[test]
    fn test_on_track_within_tolerance() {
        let route = straight_route();
        let d = detector();
        let now = Instant::now();
        let near = Coordinate::new(5.0 * M, 50.0 * M, 0);
        assert_eq!(d.evaluate(&near, &route, 0, now), OffRouteSignal::OnTrack);
    }

    #[test]
    fn test_deviated_then_suppressed() {
        let route = straight_route();
        let mut d = detector();
        let t = Instant::now();
        let off = Coordinate::new(50.0 * M, 50.0 * M, 0);

        let signal = d.evaluate(&off, &route, 0, t);
        match signal {
            OffRouteSignal::Deviated { distance_m } => assert!((distance_m - 50.0).abs() < 1.0),
            other => panic!("expected deviation, got {:?}", other),
        }

        d.suppress(t);
        assert_eq!(
            d.evaluate(&off, &route, 0, t + Duration::from_millis(100)),
            OffRouteSignal::OnTrack
        );
        assert_eq!(
            d.evaluate(&off, &route, 0, t + Duration::from_millis(4999)),
            OffRouteSignal::OnTrack
        );
        assert!(d.evaluate(&off, &route, 0, t + Duration::from_secs(5)).is_deviated());
    }

    #[test]
    fn test_other_floor_is_deviated() {
        let route = straight_route();
        let d = detector();
        let upstairs = Coordinate::new(0.0, 50.0 * M, 1);
        assert_eq!(
            d.evaluate(&upstairs, &route, 0, Instant::now()),
            OffRouteSignal::Deviated {
                distance_m: f64::INFINITY
            }
        );
    }

    #[test]
    fn test_clear_suppression() {
        let mut d = detector();
        let now = Instant::now();
        d.suppress(now);
        assert!(d.is_suppressed(now));
        d.clear_suppression();
        assert!(!d.is_suppressed(now));
        assert!(d.suppressed_until().is_none());
    }
}

//! Route geometry and instruction segments.
//!
//! A [`Route`] is an ordered, non-empty list of [`RouteSegment`]s. Each
//! segment carries one instruction. Consecutive segments share their
//! boundary point; a segment that changes floor lists the departure point
//! on the old floor followed by the arrival point on the new one, with
//! [`FloorTransition`] naming the zone that bridges them.

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};
use crate::geo::{Coordinate, bearing_delta_deg, distance_to_polyline_m};

/// Floor crossing taken at the start of a segment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloorTransition {
    pub zone_id: String,
    pub zone_name: String,
    pub from_floor: i32,
    pub to_floor: i32,
}

/// One instruction step of a route.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub points: Vec<Coordinate>,
    /// Area/section the segment runs through
    pub section: Option<String>,
    pub instruction: String,
    /// Floor the segment ends on
    pub floor: i32,
    pub transition: Option<FloorTransition>,
    /// Walked length in meters (vertical hops excluded)
    pub length_m: f64,
}

impl RouteSegment {
    /// First point
    pub fn start(&self) -> Option<&Coordinate> {
        self.points.first()
    }

    /// Last point
    pub fn end(&self) -> Option<&Coordinate> {
        self.points.last()
    }

    pub(crate) fn walked_length(points: &[Coordinate]) -> f64 {
        points
            .windows(2)
            .filter(|w| w[0].floor == w[1].floor)
            .map(|w| w[0].distance_m(&w[1]))
            .sum()
    }
}

/// A computed route.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    segments: Vec<RouteSegment>,
    length_m: f64,
}

impl Route {
    /// Create a route from segments. Empty input is never a route.
    pub fn new(segments: Vec<RouteSegment>) -> Result<Self> {
        if segments.is_empty() || segments.iter().any(|s| s.points.is_empty()) {
            return Err(NavError::NoRouteFound);
        }
        let length_m = segments.iter().map(|s| s.length_m).sum();
        Ok(Self { segments, length_m })
    }

    pub fn segments(&self) -> &[RouteSegment] {
        &self.segments
    }

    /// Number of segments (always at least one)
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment(&self, index: usize) -> Option<&RouteSegment> {
        self.segments.get(index)
    }

    /// Total walked length in meters
    pub fn length_m(&self) -> f64 {
        self.length_m
    }

    /// First point of the route
    pub fn origin(&self) -> Coordinate {
        self.segments[0].points[0]
    }

    /// Final point of the route
    pub fn destination(&self) -> Coordinate {
        let last = &self.segments[self.segments.len() - 1];
        last.points[last.points.len() - 1]
    }

    /// Number of floor crossings
    pub fn transition_count(&self) -> usize {
        self.segments.iter().filter(|s| s.transition.is_some()).count()
    }

    /// Distinct floors in travel order
    pub fn floors(&self) -> Vec<i32> {
        let mut floors: Vec<i32> = Vec::new();
        for p in self.segments.iter().flat_map(|s| s.points.iter()) {
            if floors.last() != Some(&p.floor) {
                floors.push(p.floor);
            }
        }
        floors
    }

    /// Distance from `point` to a run of segments, on the point's floor.
    pub fn distance_to_segments(&self, point: &Coordinate, from: usize, count: usize) -> Option<f64> {
        self.segments
            .iter()
            .skip(from)
            .take(count)
            .filter_map(|s| distance_to_polyline_m(point, &s.points))
            .reduce(f64::min)
    }

    /// Index of the segment closest to `point`, earliest on ties.
    ///
    /// `None` when no segment touches the point's floor.
    pub fn nearest_segment(&self, point: &Coordinate) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, segment) in self.segments.iter().enumerate() {
            if let Some(d) = distance_to_polyline_m(point, &segment.points)
                && best.is_none_or(|(_, bd)| d < bd)
            {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }
}

/// A point of the raw path handed to [`SegmentBuilder`].
#[derive(Clone, Debug)]
pub struct PathPoint {
    pub coordinate: Coordinate,
    pub section: Option<String>,
    /// Floor crossing used to reach this point
    pub via: Option<FloorTransition>,
}

/// Why a segment was started; picks the instruction wording.
#[derive(Clone, Debug)]
enum SegmentStart {
    Depart,
    Turn(f64),
    EnterSection,
    Transition,
    Continue,
}

struct OpenSegment {
    points: Vec<Coordinate>,
    section: Option<String>,
    transition: Option<FloorTransition>,
    start: SegmentStart,
}

impl OpenSegment {
    fn new(first: Coordinate, section: Option<String>, start: SegmentStart) -> Self {
        Self {
            points: vec![first],
            section,
            transition: None,
            start,
        }
    }
}

/// Splits a raw point path into instruction segments.
pub struct SegmentBuilder {
    turn_angle_deg: f64,
}

/// Legs shorter than this carry no reliable heading (meters).
const MIN_HEADING_LEG_M: f64 = 0.5;

impl SegmentBuilder {
    pub fn new(turn_angle_deg: f64) -> Self {
        Self { turn_angle_deg }
    }

    /// Build segments. `destination` labels the final instruction.
    pub fn build(&self, path: &[PathPoint], destination: Option<&str>) -> Result<Route> {
        let Some(first) = path.first() else {
            return Err(NavError::NoRouteFound);
        };

        let mut done: Vec<OpenSegment> = Vec::new();
        let mut current = OpenSegment::new(first.coordinate, first.section.clone(), SegmentStart::Depart);

        for p in &path[1..] {
            let last = *current.points.last().unwrap_or(&first.coordinate);

            if let Some(via) = &p.via {
                if current.points.len() > 1 || current.transition.is_some() {
                    let section = p.section.clone().or(current.section.clone());
                    let prev = std::mem::replace(
                        &mut current,
                        OpenSegment::new(last, section, SegmentStart::Transition),
                    );
                    done.push(prev);
                } else {
                    // Nothing walked yet on the old floor: the hop becomes this segment
                    current.start = SegmentStart::Transition;
                    if p.section.is_some() {
                        current.section = p.section.clone();
                    }
                }
                current.transition = Some(via.clone());
                current.points.push(p.coordinate);
                continue;
            }

            if current.transition.is_some() {
                // A floor hop always ends at its arrival point
                let section = p.section.clone().or(current.section.clone());
                let prev = std::mem::replace(
                    &mut current,
                    OpenSegment::new(last, section, SegmentStart::Continue),
                );
                done.push(prev);
                current.points.push(p.coordinate);
                continue;
            }

            match (&current.section, &p.section) {
                (Some(cur), Some(next)) if cur != next => {
                    current.points.push(p.coordinate);
                    let prev = std::mem::replace(
                        &mut current,
                        OpenSegment::new(p.coordinate, Some(next.clone()), SegmentStart::EnterSection),
                    );
                    done.push(prev);
                    continue;
                }
                (None, Some(next)) => current.section = Some(next.clone()),
                _ => {}
            }

            if let Some(turn) = self.turn_at(&current.points, &p.coordinate) {
                let section = current.section.clone();
                let prev = std::mem::replace(
                    &mut current,
                    OpenSegment::new(last, section, SegmentStart::Turn(turn)),
                );
                done.push(prev);
            }
            current.points.push(p.coordinate);
        }
        done.push(current);

        // A trailing single-point segment adds nothing
        if done.len() > 1 && done.last().is_some_and(|s| s.points.len() < 2 && s.transition.is_none()) {
            done.pop();
        }

        let last_index = done.len() - 1;
        let segments = done
            .into_iter()
            .enumerate()
            .map(|(i, open)| self.finish(open, i == last_index, destination))
            .collect();

        Route::new(segments)
    }

    fn turn_at(&self, points: &[Coordinate], next: &Coordinate) -> Option<f64> {
        if points.len() < 2 {
            return None;
        }
        let a = &points[points.len() - 2];
        let b = &points[points.len() - 1];
        if a.floor != b.floor
            || b.floor != next.floor
            || a.distance_m(b) < MIN_HEADING_LEG_M
            || b.distance_m(next) < MIN_HEADING_LEG_M
        {
            return None;
        }
        let delta = bearing_delta_deg(a.bearing_deg(b), b.bearing_deg(next));
        (delta.abs() > self.turn_angle_deg).then_some(delta)
    }

    fn finish(&self, open: OpenSegment, is_last: bool, destination: Option<&str>) -> RouteSegment {
        let floor = open.points.last().map(|p| p.floor).unwrap_or_default();
        let through = open
            .section
            .as_deref()
            .map(|s| format!(" through {}", s))
            .unwrap_or_default();

        let mut instruction = match (&open.start, &open.transition) {
            (_, Some(t)) => {
                let direction = if t.to_floor > t.from_floor { "up" } else { "down" };
                let name = if t.zone_name.is_empty() { t.zone_id.as_str() } else { t.zone_name.as_str() };
                format!("Take {} {} to floor {}", name, direction, t.to_floor)
            }
            (SegmentStart::Depart, None) => {
                let heading = open.points.windows(2).find(|w| w[0].distance_m(&w[1]) >= MIN_HEADING_LEG_M);
                match heading {
                    Some(w) => format!("Head {}{}", cardinal(w[0].bearing_deg(&w[1])), through),
                    None => format!("Start{}", through),
                }
            }
            (SegmentStart::Turn(delta), None) => format!("{}{}", turn_phrase(*delta), through),
            (SegmentStart::EnterSection, None) => match &open.section {
                Some(s) => format!("Continue into {}", s),
                None => "Continue".to_string(),
            },
            (SegmentStart::Continue | SegmentStart::Transition, None) => format!("Continue{}", through),
        };

        if is_last {
            match destination {
                Some(label) => instruction.push_str(&format!(", then arrive at {}", label)),
                None => instruction.push_str(", then arrive at your destination"),
            }
        }

        let length_m = RouteSegment::walked_length(&open.points);
        RouteSegment {
            points: open.points,
            section: open.section,
            instruction,
            floor,
            transition: open.transition,
            length_m,
        }
    }
}

fn cardinal(bearing: f64) -> &'static str {
    const NAMES: [&str; 8] = [
        "north", "northeast", "east", "southeast", "south", "southwest", "west", "northwest",
    ];
    let idx = ((bearing + 22.5).rem_euclid(360.0) / 45.0) as usize;
    NAMES[idx % 8]
}

fn turn_phrase(delta: f64) -> &'static str {
    let side_right = delta > 0.0;
    match (delta.abs(), side_right) {
        (a, true) if a < 60.0 => "Bear right",
        (a, false) if a < 60.0 => "Bear left",
        (a, true) if a < 135.0 => "Turn right",
        (a, false) if a < 135.0 => "Turn left",
        (_, true) => "Make a sharp right",
        (_, false) => "Make a sharp left",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(lat: f64, lon: f64, floor: i32) -> PathPoint {
        PathPoint {
            coordinate: Coordinate::new(lat, lon, floor),
            section: None,
            via: None,
        }
    }

    fn lift(from: i32, to: i32) -> FloorTransition {
        FloorTransition {
            zone_id: "lift".to_string(),
            zone_name: "Lift A".to_string(),
            from_floor: from,
            to_floor: to,
        }
    }

    #[test]
    fn test_straight_path_single_segment() {
        let path = vec![pt(0.0, 0.0, 0), pt(0.0, 0.0005, 0), pt(0.0, 0.001, 0)];
        let route = SegmentBuilder::new(35.0).build(&path, None).unwrap();
        assert_eq!(route.len(), 1);
        assert!(route.segments()[0].instruction.starts_with("Head east"));
        assert!(route.segments()[0].instruction.ends_with("arrive at your destination"));
        assert!((route.length_m() - 111.2).abs() < 1.0);
    }

    #[test]
    fn test_turn_splits_segments_contiguously() {
        let path = vec![pt(0.0, 0.0, 0), pt(0.0, 0.001, 0), pt(0.001, 0.001, 0)];
        let route = SegmentBuilder::new(35.0).build(&path, Some("Shoes")).unwrap();
        assert_eq!(route.len(), 2);
        assert_eq!(route.segments()[0].end(), route.segments()[1].start());
        assert!(route.segments()[1].instruction.starts_with("Turn left"));
        assert!(route.segments()[1].instruction.ends_with("arrive at Shoes"));
    }

    #[test]
    fn test_direct_floor_hop_is_one_segment() {
        let mut b = pt(0.0, 0.0, 1);
        b.via = Some(lift(0, 1));
        let route = SegmentBuilder::new(35.0).build(&[pt(0.0, 0.0, 0), b], None).unwrap();
        assert_eq!(route.len(), 1);
        assert_eq!(route.transition_count(), 1);
        assert_eq!(route.floors(), vec![0, 1]);
        assert_eq!(route.segments()[0].floor, 1);
        assert!(route.segments()[0].instruction.starts_with("Take Lift A up to floor 1"));
    }

    #[test]
    fn test_walk_hop_walk() {
        let mut hop = pt(0.0, 0.001, 1);
        hop.via = Some(lift(0, 1));
        let path = vec![pt(0.0, 0.0, 0), pt(0.0, 0.001, 0), hop, pt(0.0, 0.002, 1)];
        let route = SegmentBuilder::new(35.0).build(&path, None).unwrap();
        assert_eq!(route.len(), 3);
        assert!(route.segments()[1].transition.is_some());
        assert_eq!(route.segments()[1].start(), route.segments()[0].end());
        assert_eq!(route.segments()[2].start(), route.segments()[1].end());
    }

    #[test]
    fn test_section_change_starts_segment() {
        let mut a = pt(0.0, 0.0, 0);
        a.section = Some("hall".to_string());
        let b = pt(0.0, 0.0005, 0);
        let mut c = pt(0.0, 0.001, 0);
        c.section = Some("food-court".to_string());
        let d = pt(0.0, 0.0015, 0);
        let route = SegmentBuilder::new(35.0).build(&[a, b, c, d], None).unwrap();
        assert_eq!(route.len(), 2);
        assert_eq!(route.segments()[1].section.as_deref(), Some("food-court"));
        assert!(route.segments()[1].instruction.starts_with("Continue into food-court"));
    }

    #[test]
    fn test_nearest_segment() {
        let path = vec![pt(0.0, 0.0, 0), pt(0.0, 0.001, 0), pt(0.001, 0.001, 0)];
        let route = SegmentBuilder::new(35.0).build(&path, None).unwrap();
        assert_eq!(route.nearest_segment(&Coordinate::new(0.0001, 0.0002, 0)), Some(0));
        assert_eq!(route.nearest_segment(&Coordinate::new(0.0008, 0.0011, 0)), Some(1));
        assert_eq!(route.nearest_segment(&Coordinate::new(0.0008, 0.0011, 4)), None);
    }

    #[test]
    fn test_empty_route_rejected() {
        assert!(matches!(Route::new(Vec::new()), Err(NavError::NoRouteFound)));
        assert!(matches!(
            SegmentBuilder::new(35.0).build(&[], None),
            Err(NavError::NoRouteFound)
        ));
    }

    #[test]
    fn test_cardinal_names() {
        assert_eq!(cardinal(0.0), "north");
        assert_eq!(cardinal(359.0), "north");
        assert_eq!(cardinal(90.0), "east");
        assert_eq!(cardinal(225.0), "southwest");
    }
}

//! Floor-aware A* route engine.
//!
//! Searches the venue's walkable graph. Same-floor edges cost their length;
//! floor crossings cost their length plus a fixed transition penalty. The
//! heuristic is the great-circle distance to the goal, which never
//! overestimates either kind of edge.
//!
//! Equal-cost candidates are expanded in node insertion order, so identical
//! inputs always produce identical routes.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::NavigationConfig;
use crate::error::{NavError, Result};
use crate::geo::Coordinate;
use crate::venue::Venue;

use super::graph::{EdgeKind, NodeId};
use super::route::{FloorTransition, PathPoint, Route, SegmentBuilder};
use super::ticket::RouteTicket;

/// How often (in expansions) the search checks for cancellation.
const CANCEL_CHECK_INTERVAL: usize = 64;

/// Consecutive points closer than this are merged (meters).
const DUPLICATE_POINT_M: f64 = 0.05;

/// Configuration for the route engine.
#[derive(Clone, Debug)]
pub struct RouteEngineConfig {
    /// Fixed cost of one floor crossing (meters equivalent)
    pub transition_penalty_m: f64,
    /// Maximum endpoint-to-node snapping distance (meters)
    pub snap_radius_m: f64,
    /// Heading change that starts a new instruction (degrees)
    pub turn_angle_deg: f64,
    /// Maximum node expansions
    pub max_iterations: usize,
}

impl Default for RouteEngineConfig {
    fn default() -> Self {
        Self::from(&NavigationConfig::default())
    }
}

impl From<&NavigationConfig> for RouteEngineConfig {
    fn from(nav: &NavigationConfig) -> Self {
        Self {
            transition_penalty_m: nav.floor_transition_penalty_m,
            snap_radius_m: nav.snap_radius_m,
            turn_angle_deg: nav.turn_angle_deg,
            max_iterations: nav.max_search_iterations,
        }
    }
}

/// Node in the open set.
#[derive(Clone, Debug)]
struct SearchNode {
    node: NodeId,
    f_score: f64,
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchNode {}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap; lower node id wins ties
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Resolved goal of a request.
struct Goal {
    node: NodeId,
    point: Coordinate,
    label: Option<String>,
}

/// Route engine over a loaded venue. Cheap to clone; `Send + Sync`.
#[derive(Clone, Debug)]
pub struct RouteEngine {
    venue: Arc<Venue>,
    config: RouteEngineConfig,
}

impl RouteEngine {
    pub fn new(venue: Arc<Venue>, config: RouteEngineConfig) -> Self {
        Self { venue, config }
    }

    pub fn venue(&self) -> &Arc<Venue> {
        &self.venue
    }

    pub fn config(&self) -> &RouteEngineConfig {
        &self.config
    }

    /// Compute a route from `start` to `end`.
    ///
    /// With `cut_at_entrance`, a destination inside an area that declares an
    /// entrance ends at that entrance instead of the raw target.
    pub fn find_route(&self, start: Coordinate, end: Coordinate, cut_at_entrance: bool) -> Result<Route> {
        self.find_route_cancellable(start, end, cut_at_entrance, &RouteTicket::detached())
    }

    /// Like [`find_route`](Self::find_route), aborting with `RouteCancelled`
    /// as soon as `ticket` is superseded.
    pub fn find_route_cancellable(
        &self,
        start: Coordinate,
        end: Coordinate,
        cut_at_entrance: bool,
        ticket: &RouteTicket,
    ) -> Result<Route> {
        let graph = self.venue.graph();

        for point in [&start, &end] {
            if !point.latitude.is_finite() || !point.longitude.is_finite() {
                debug!("Route endpoint ({}, {}) is not finite", point.latitude, point.longitude);
                return Err(NavError::InvalidFix {
                    latitude: point.latitude,
                    longitude: point.longitude,
                });
            }
        }

        if !graph.has_floor(start.floor) || !graph.has_floor(end.floor) {
            debug!(
                "Route endpoints on floors {} -> {} not present in walk graph",
                start.floor, end.floor
            );
            return Err(NavError::NoRouteFound);
        }

        let start_node = graph
            .nearest_node(&start, self.config.snap_radius_m)
            .ok_or(NavError::NoRouteFound)?;
        let goal = self.resolve_goal(&end, cut_at_entrance)?;

        info!(
            "Planning route from ({:.6}, {:.6}, F{}) to ({:.6}, {:.6}, F{})",
            start.latitude, start.longitude, start.floor, goal.point.latitude, goal.point.longitude, goal.point.floor
        );

        let nodes = self.search(start_node, goal.node, ticket)?;
        let path = self.assemble(start, &nodes, &goal);
        let route = SegmentBuilder::new(self.config.turn_angle_deg).build(&path, goal.label.as_deref())?;

        info!(
            "Route found: {} segments, {:.1}m, {} floor changes",
            route.len(),
            route.length_m(),
            route.transition_count()
        );
        Ok(route)
    }

    fn resolve_goal(&self, end: &Coordinate, cut_at_entrance: bool) -> Result<Goal> {
        let graph = self.venue.graph();
        let area = self.venue.area_at(end);
        let label = area.map(|a| if a.name.is_empty() { a.id.clone() } else { a.name.clone() });

        if cut_at_entrance
            && let Some(entrance) = area.and_then(|a| a.entrance)
        {
            debug!("Cutting route at entrance of area {:?}", label);
            return Ok(Goal {
                node: entrance,
                point: graph.node(entrance).coordinate,
                label,
            });
        }

        let node = graph
            .nearest_node(end, self.config.snap_radius_m)
            .ok_or(NavError::NoRouteFound)?;
        Ok(Goal {
            node,
            point: *end,
            label,
        })
    }

    /// A* over node ids. Returns the node sequence from start to goal.
    fn search(&self, start: NodeId, goal: NodeId, ticket: &RouteTicket) -> Result<Vec<NodeId>> {
        let graph = self.venue.graph();
        let n = graph.node_count();
        let goal_coord = graph.node(goal).coordinate;

        let mut g_score = vec![f64::INFINITY; n];
        let mut parent: Vec<Option<NodeId>> = vec![None; n];
        let mut closed = vec![false; n];
        let mut open_set = BinaryHeap::new();

        g_score[start] = 0.0;
        open_set.push(SearchNode {
            node: start,
            f_score: graph.node(start).coordinate.distance_m(&goal_coord),
        });

        let mut iterations = 0usize;

        while let Some(SearchNode { node: current, .. }) = open_set.pop() {
            if closed[current] {
                continue;
            }
            if current == goal {
                debug!("A* reached goal after {} expansions", iterations);
                return Ok(Self::reconstruct_path(&parent, goal));
            }
            closed[current] = true;

            iterations += 1;
            if iterations % CANCEL_CHECK_INTERVAL == 0 && !ticket.is_current() {
                debug!("Route request {} superseded during search", ticket.id());
                return Err(NavError::RouteCancelled);
            }
            if iterations > self.config.max_iterations {
                warn!("Route search exceeded {} expansions", self.config.max_iterations);
                return Err(NavError::NoRouteFound);
            }

            for edge in graph.edges(current) {
                if closed[edge.to] {
                    continue;
                }
                let cost = match edge.kind {
                    EdgeKind::Walk => edge.length_m,
                    EdgeKind::Transition { .. } => edge.length_m + self.config.transition_penalty_m,
                };
                let tentative = g_score[current] + cost;
                if tentative < g_score[edge.to] {
                    g_score[edge.to] = tentative;
                    parent[edge.to] = Some(current);
                    open_set.push(SearchNode {
                        node: edge.to,
                        f_score: tentative + graph.node(edge.to).coordinate.distance_m(&goal_coord),
                    });
                }
            }
        }

        if !ticket.is_current() {
            return Err(NavError::RouteCancelled);
        }
        debug!("A* exhausted open set after {} expansions", iterations);
        Err(NavError::NoRouteFound)
    }

    fn reconstruct_path(parent: &[Option<NodeId>], goal: NodeId) -> Vec<NodeId> {
        let mut path = vec![goal];
        let mut current = goal;
        while let Some(p) = parent[current] {
            path.push(p);
            current = p;
        }
        path.reverse();
        path
    }

    /// Raw start, graph nodes, goal point; with floor crossings annotated.
    fn assemble(&self, start: Coordinate, nodes: &[NodeId], goal: &Goal) -> Vec<PathPoint> {
        let graph = self.venue.graph();
        let mut path: Vec<PathPoint> = Vec::with_capacity(nodes.len() + 2);

        let push = |point: PathPoint, path: &mut Vec<PathPoint>| {
            if let Some(last) = path.last_mut()
                && point.via.is_none()
                && last.coordinate.floor == point.coordinate.floor
                && last.coordinate.distance_m(&point.coordinate) < DUPLICATE_POINT_M
            {
                if last.section.is_none() {
                    last.section = point.section;
                }
                return;
            }
            path.push(point);
        };

        push(
            PathPoint {
                coordinate: start,
                section: None,
                via: None,
            },
            &mut path,
        );

        let mut previous: Option<NodeId> = None;
        for &id in nodes {
            let node = graph.node(id);
            let via = previous.and_then(|prev| {
                graph
                    .edges(prev)
                    .iter()
                    .find(|e| e.to == id)
                    .and_then(|e| match &e.kind {
                        EdgeKind::Transition { zone_id } => {
                            let zone_name = self
                                .venue
                                .geofence()
                                .zone(zone_id)
                                .map(|z| z.name.clone())
                                .unwrap_or_default();
                            Some(FloorTransition {
                                zone_id: zone_id.clone(),
                                zone_name,
                                from_floor: graph.node(prev).coordinate.floor,
                                to_floor: node.coordinate.floor,
                            })
                        }
                        EdgeKind::Walk => None,
                    })
            });
            push(
                PathPoint {
                    coordinate: node.coordinate,
                    section: node.section.clone(),
                    via,
                },
                &mut path,
            );
            previous = Some(id);
        }

        push(
            PathPoint {
                coordinate: goal.point,
                section: None,
                via: None,
            },
            &mut path,
        );
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geofence::{Zone, ZoneKind};
    use crate::routing::{EdgeData, NodeData};
    use crate::venue::{AreaData, FloorInfo, VenueData};

    const D: f64 = 0.0001; // ~11m

    fn node(id: &str, lat: f64, lon: f64, floor: i32) -> NodeData {
        NodeData {
            id: id.to_string(),
            coordinate: Coordinate::new(lat, lon, floor),
            section: None,
        }
    }

    fn edge(a: &str, b: &str) -> EdgeData {
        EdgeData {
            from: a.to_string(),
            to: b.to_string(),
        }
    }

    fn square(lat: f64, lon: f64, half: f64, floor: i32) -> Vec<Coordinate> {
        vec![
            Coordinate::new(lat - half, lon - half, floor),
            Coordinate::new(lat - half, lon + half, floor),
            Coordinate::new(lat + half, lon + half, floor),
            Coordinate::new(lat + half, lon - half, floor),
        ]
    }

    fn floors(levels: &[i32]) -> Vec<FloorInfo> {
        levels
            .iter()
            .map(|&level| FloorInfo {
                level,
                name: format!("L{}", level),
                floor_plan_ref: format!("fp-{}", level),
            })
            .collect()
    }

    fn engine(data: VenueData) -> RouteEngine {
        RouteEngine::new(Venue::load(data).unwrap(), RouteEngineConfig::default())
    }

    /// Diamond a -> {b, c} -> d with equal costs on both branches.
    fn diamond() -> VenueData {
        VenueData {
            venue_id: "diamond".to_string(),
            floors: floors(&[0]),
            nodes: vec![
                node("a", 0.0, 0.0, 0),
                node("b", D, D, 0),
                node("c", -D, D, 0),
                node("d", 0.0, 2.0 * D, 0),
            ],
            edges: vec![edge("a", "c"), edge("a", "b"), edge("b", "d"), edge("c", "d")],
            ..Default::default()
        }
    }

    #[test]
    fn test_route_endpoints_match_request() {
        let engine = engine(diamond());
        let start = Coordinate::new(0.0, 0.0, 0);
        let end = Coordinate::new(0.0, 2.0 * D, 0);
        let route = engine.find_route(start, end, false).unwrap();
        assert_eq!(route.origin(), start);
        assert_eq!(route.destination(), end);
        assert!(route.length_m() > 0.0);
    }

    #[test]
    fn test_ties_follow_insertion_order() {
        let engine = engine(diamond());
        let start = Coordinate::new(0.0, 0.0, 0);
        let end = Coordinate::new(0.0, 2.0 * D, 0);

        let route = engine.find_route(start, end, false).unwrap();
        let points: Vec<_> = route.segments().iter().flat_map(|s| s.points.clone()).collect();
        // "b" is inserted before "c", so the northern branch wins
        assert!(points.iter().any(|p| p.latitude == D));
        assert!(!points.iter().any(|p| p.latitude == -D));

        // Repeatable
        assert_eq!(engine.find_route(start, end, false).unwrap(), route);
    }

    #[test]
    fn test_disconnected_is_no_route() {
        let mut data = diamond();
        data.nodes.push(node("island", 0.0, 4.0 * D, 0));
        let engine = engine(data);
        let result = engine.find_route(Coordinate::new(0.0, 0.0, 0), Coordinate::new(0.0, 4.0 * D, 0), false);
        assert!(matches!(result, Err(NavError::NoRouteFound)));
    }

    #[test]
    fn test_unknown_floor_is_no_route() {
        let engine = engine(diamond());
        let result = engine.find_route(Coordinate::new(0.0, 0.0, 0), Coordinate::new(0.0, D, 3), false);
        assert!(matches!(result, Err(NavError::NoRouteFound)));
    }

    #[test]
    fn test_endpoint_beyond_snap_radius_is_no_route() {
        let engine = engine(diamond());
        let result = engine.find_route(Coordinate::new(0.0, 0.0, 0), Coordinate::new(0.01, 0.0, 0), false);
        assert!(matches!(result, Err(NavError::NoRouteFound)));
    }

    #[test]
    fn test_non_finite_endpoint_rejected() {
        let engine = engine(diamond());
        let good = Coordinate::new(0.0, 0.0, 0);

        let result = engine.find_route(Coordinate::new(f64::NAN, f64::NAN, 0), good, false);
        assert!(matches!(result, Err(NavError::InvalidFix { .. })));

        let result = engine.find_route(good, Coordinate::new(0.0, f64::INFINITY, 0), false);
        assert!(matches!(result, Err(NavError::InvalidFix { .. })));
    }

    #[test]
    fn test_floor_crossing_needs_lift_zones() {
        // One lift between the floors, short corridor upstairs
        let mut data = VenueData {
            venue_id: "two-floor".to_string(),
            floors: floors(&[0, 1]),
            nodes: vec![
                node("a0", 0.0, 0.0, 0),
                node("a1", 0.0, 0.0, 1),
                node("b1", 0.0, D, 1),
            ],
            edges: vec![edge("a0", "a1"), edge("a1", "b1")],
            zones: vec![
                Zone {
                    id: "lift-0".to_string(),
                    name: "Lift".to_string(),
                    floor: 0,
                    polygon: square(0.0, 0.0, D / 4.0, 0),
                    kind: ZoneKind::FloorChange { target_floors: vec![1] },
                },
                Zone {
                    id: "lift-1".to_string(),
                    name: "Lift".to_string(),
                    floor: 1,
                    polygon: square(0.0, 0.0, D / 4.0, 1),
                    kind: ZoneKind::FloorChange { target_floors: vec![0] },
                },
            ],
            ..Default::default()
        };
        let route = engine(data.clone())
            .find_route(Coordinate::new(0.0, 0.0, 0), Coordinate::new(0.0, D, 1), false)
            .unwrap();
        assert_eq!(route.transition_count(), 1);
        assert_eq!(route.floors(), vec![0, 1]);

        // Without the lift zones the crossing edge is dropped entirely
        data.zones.clear();
        let result = engine(data).find_route(Coordinate::new(0.0, 0.0, 0), Coordinate::new(0.0, D, 1), false);
        assert!(matches!(result, Err(NavError::NoRouteFound)));
    }

    #[test]
    fn test_cut_at_entrance() {
        let mut data = diamond();
        data.nodes.push(node("inside", 0.0, 3.0 * D, 0));
        data.edges.push(edge("d", "inside"));
        data.areas.push(AreaData {
            id: "store".to_string(),
            name: "Books".to_string(),
            floor: 0,
            polygon: square(0.0, 3.0 * D, 0.9 * D, 0),
            entrance: Some("d".to_string()),
            category: None,
        });
        let engine = engine(data);
        let start = Coordinate::new(0.0, 0.0, 0);
        let target = Coordinate::new(0.0, 3.0 * D, 0);

        let cut = engine.find_route(start, target, true).unwrap();
        assert_eq!(cut.destination(), Coordinate::new(0.0, 2.0 * D, 0));
        assert!(cut.segments().last().unwrap().instruction.ends_with("arrive at Books"));

        let full = engine.find_route(start, target, false).unwrap();
        assert_eq!(full.destination(), target);
        assert!(full.length_m() > cut.length_m());
    }

    #[test]
    fn test_cancelled_ticket_aborts() {
        // Long corridor so the search runs past the first cancellation check
        let mut data = VenueData {
            venue_id: "corridor".to_string(),
            floors: floors(&[0]),
            ..Default::default()
        };
        for i in 0..200 {
            data.nodes.push(node(&format!("n{}", i), 0.0, i as f64 * D / 10.0, 0));
            if i > 0 {
                data.edges.push(edge(&format!("n{}", i - 1), &format!("n{}", i)));
            }
        }
        let engine = engine(data);
        let requests = super::super::RouteRequests::new();
        let ticket = requests.issue();
        requests.invalidate();

        let result = engine.find_route_cancellable(
            Coordinate::new(0.0, 0.0, 0),
            Coordinate::new(0.0, 199.0 * D / 10.0, 0),
            false,
            &ticket,
        );
        assert!(matches!(result, Err(NavError::RouteCancelled)));
    }
}

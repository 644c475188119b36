//! Walkable network of the venue.
//!
//! Nodes are junctions and walkable areas, edges are passable connections.
//! Edges joining two floors are only accepted when both ends sit inside a
//! floor change zone that reaches the other floor.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{NavError, Result};
use crate::geo::Coordinate;
use crate::geofence::GeofenceIndex;

/// Index of a node in [`WalkGraph`], equal to its insertion order.
pub type NodeId = usize;

/// Walkable node as supplied by the venue provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub id: String,
    pub coordinate: Coordinate,
    /// Area/section this node belongs to (corridor name, store id, ...)
    #[serde(default)]
    pub section: Option<String>,
}

/// Undirected connection between two nodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeData {
    pub from: String,
    pub to: String,
}

/// How an edge is traversed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EdgeKind {
    /// Same-floor walking
    Walk,
    /// Floor crossing through the named floor change zone
    Transition { zone_id: String },
}

/// Outgoing edge in the adjacency list.
#[derive(Clone, Debug)]
pub struct GraphEdge {
    pub to: NodeId,
    /// Planar length in meters (0 for a vertical hop)
    pub length_m: f64,
    pub kind: EdgeKind,
}

/// Graph node.
#[derive(Clone, Debug)]
pub struct GraphNode {
    pub key: String,
    pub coordinate: Coordinate,
    pub section: Option<String>,
}

/// Read-only walkable graph.
#[derive(Clone, Debug, Default)]
pub struct WalkGraph {
    nodes: Vec<GraphNode>,
    adjacency: Vec<Vec<GraphEdge>>,
    by_key: HashMap<String, NodeId>,
}

impl WalkGraph {
    /// Build the graph. Unknown node ids are an error; unsupported floor
    /// crossings are dropped with a warning.
    pub fn build(nodes: &[NodeData], edges: &[EdgeData], zones: &GeofenceIndex) -> Result<Self> {
        let mut graph = WalkGraph {
            nodes: Vec::with_capacity(nodes.len()),
            adjacency: vec![Vec::new(); nodes.len()],
            by_key: HashMap::with_capacity(nodes.len()),
        };

        for node in nodes {
            if graph.by_key.contains_key(&node.id) {
                return Err(NavError::InvalidVenue(format!("duplicate node id '{}'", node.id)));
            }
            graph.by_key.insert(node.id.clone(), graph.nodes.len());
            graph.nodes.push(GraphNode {
                key: node.id.clone(),
                coordinate: node.coordinate,
                section: node.section.clone(),
            });
        }

        let mut dropped = 0usize;
        for edge in edges {
            let a = graph.lookup(&edge.from)?;
            let b = graph.lookup(&edge.to)?;
            if a == b {
                continue;
            }

            let ca = graph.nodes[a].coordinate;
            let cb = graph.nodes[b].coordinate;

            let kind = if ca.floor == cb.floor {
                EdgeKind::Walk
            } else {
                let zone_a = zones.floor_change_zone(&ca, cb.floor);
                let zone_b = zones.floor_change_zone(&cb, ca.floor);
                match (zone_a, zone_b) {
                    (Some(za), Some(_)) => EdgeKind::Transition {
                        zone_id: za.id.clone(),
                    },
                    _ => {
                        warn!(
                            "Dropping edge {} -> {}: floors {} and {} not joined by a floor change zone",
                            edge.from, edge.to, ca.floor, cb.floor
                        );
                        dropped += 1;
                        continue;
                    }
                }
            };

            let length_m = ca.distance_m(&cb);
            graph.adjacency[a].push(GraphEdge {
                to: b,
                length_m,
                kind: kind.clone(),
            });
            graph.adjacency[b].push(GraphEdge {
                to: a,
                length_m,
                kind,
            });
        }

        if dropped > 0 {
            warn!("{} inter-floor edges dropped", dropped);
        }

        Ok(graph)
    }

    fn lookup(&self, key: &str) -> Result<NodeId> {
        self.by_key
            .get(key)
            .copied()
            .ok_or_else(|| NavError::InvalidVenue(format!("edge references unknown node '{}'", key)))
    }

    /// Node id for a provider key
    pub fn node_id(&self, key: &str) -> Option<NodeId> {
        self.by_key.get(key).copied()
    }

    /// Node by id
    #[inline]
    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id]
    }

    /// Outgoing edges, in insertion order
    #[inline]
    pub fn edges(&self, id: NodeId) -> &[GraphEdge] {
        &self.adjacency[id]
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Check if any node lies on `floor`
    pub fn has_floor(&self, floor: i32) -> bool {
        self.nodes.iter().any(|n| n.coordinate.floor == floor)
    }

    /// Nearest node on the same floor within `max_distance_m`.
    ///
    /// Ties go to the node inserted first.
    pub fn nearest_node(&self, point: &Coordinate, max_distance_m: f64) -> Option<NodeId> {
        let mut best: Option<(NodeId, f64)> = None;
        for (id, node) in self.nodes.iter().enumerate() {
            if node.coordinate.floor != point.floor {
                continue;
            }
            let d = node.coordinate.distance_m(point);
            if !d.is_finite() || d > max_distance_m {
                continue;
            }
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((id, d));
            }
        }
        best.map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geofence::{Zone, ZoneKind};

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

    fn lift(floor: i32, target: i32) -> Zone {
        let d = 0.0001;
        Zone {
            id: format!("lift-{}", floor),
            name: "Lift".to_string(),
            floor,
            polygon: vec![
                Coordinate::new(-d, -d, floor),
                Coordinate::new(-d, d, floor),
                Coordinate::new(d, d, floor),
                Coordinate::new(d, -d, floor),
            ],
            kind: ZoneKind::FloorChange {
                target_floors: vec![target],
            },
        }
    }

    #[test]
    fn test_transition_edge_needs_zones() {
        let nodes = vec![node("a", 0.0, 0.0, 0), node("b", 0.0, 0.0, 1), node("c", 0.01, 0.0, 1)];
        let edges = vec![edge("a", "b"), edge("a", "c")];
        let zones = GeofenceIndex::new(vec![lift(0, 1), lift(1, 0)]);

        let graph = WalkGraph::build(&nodes, &edges, &zones).unwrap();
        assert_eq!(graph.edge_count(), 1);
        assert!(matches!(
            graph.edges(0)[0].kind,
            EdgeKind::Transition { ref zone_id } if zone_id == "lift-0"
        ));
    }

    #[test]
    fn test_unknown_node_is_invalid_venue() {
        let nodes = vec![node("a", 0.0, 0.0, 0)];
        let result = WalkGraph::build(&nodes, &[edge("a", "zz")], &GeofenceIndex::default());
        assert!(matches!(result, Err(NavError::InvalidVenue(_))));
    }

    #[test]
    fn test_duplicate_node_is_invalid_venue() {
        let nodes = vec![node("a", 0.0, 0.0, 0), node("a", 0.0, 0.001, 0)];
        let result = WalkGraph::build(&nodes, &[], &GeofenceIndex::default());
        assert!(matches!(result, Err(NavError::InvalidVenue(_))));
    }

    #[test]
    fn test_nearest_node_same_floor_only() {
        let nodes = vec![node("a", 0.0, 0.0, 0), node("b", 0.0, 0.0001, 1), node("c", 0.0, 0.001, 0)];
        let graph = WalkGraph::build(&nodes, &[], &GeofenceIndex::default()).unwrap();

        let probe = Coordinate::new(0.0, 0.0001, 0);
        assert_eq!(graph.nearest_node(&probe, 1000.0), Some(0));
        assert_eq!(graph.nearest_node(&probe.on_floor(1), 1000.0), Some(1));
        assert_eq!(graph.nearest_node(&probe.on_floor(3), 1000.0), None);
        assert_eq!(graph.nearest_node(&probe, 1.0), None);
    }

    #[test]
    fn test_nearest_node_skips_non_finite_point() {
        let nodes = vec![node("a", 0.0, 0.0, 0), node("b", 0.0, 0.0001, 0)];
        let graph = WalkGraph::build(&nodes, &[], &GeofenceIndex::default()).unwrap();

        assert_eq!(graph.nearest_node(&Coordinate::new(f64::NAN, f64::NAN, 0), 1000.0), None);
        assert_eq!(graph.nearest_node(&Coordinate::new(0.0, f64::INFINITY, 0), f64::INFINITY), None);
    }
}

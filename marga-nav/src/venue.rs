//! Venue data: floors, walkable graph, zones and areas.
//!
//! The venue provider hands over a [`VenueData`] snapshot; [`Venue::load`]
//! validates it and builds the read-only indexes the navigation core
//! queries. A loaded venue is shared behind an `Arc` and never mutated.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{NavError, Result};
use crate::geo::{Coordinate, polygon_contains};
use crate::geofence::{GeofenceIndex, Zone};
use crate::routing::{EdgeData, NodeData, NodeId, WalkGraph};

/// A floor of the venue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloorInfo {
    pub level: i32,
    #[serde(default)]
    pub name: String,
    /// Indoor positioning service floor plan identifier
    #[serde(default)]
    pub floor_plan_ref: String,
}

/// Store, section or POI area as supplied by the provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AreaData {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub floor: i32,
    pub polygon: Vec<Coordinate>,
    /// Node id of the area's entrance (door)
    #[serde(default)]
    pub entrance: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Raw venue snapshot from the venue data provider.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VenueData {
    pub venue_id: String,
    pub floors: Vec<FloorInfo>,
    #[serde(default)]
    pub nodes: Vec<NodeData>,
    #[serde(default)]
    pub edges: Vec<EdgeData>,
    #[serde(default)]
    pub zones: Vec<Zone>,
    #[serde(default)]
    pub areas: Vec<AreaData>,
}

impl VenueData {
    /// Parse a venue snapshot from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// A validated area with its entrance resolved to a graph node.
#[derive(Clone, Debug, PartialEq)]
pub struct Area {
    pub id: String,
    pub name: String,
    pub floor: i32,
    pub polygon: Vec<Coordinate>,
    pub entrance: Option<NodeId>,
    pub category: Option<String>,
}

impl Area {
    /// Check if the area contains a point (same floor, inclusive boundary)
    pub fn contains(&self, point: &Coordinate) -> bool {
        point.floor == self.floor && polygon_contains(&self.polygon, point)
    }
}

/// Loaded, read-only venue.
#[derive(Debug)]
pub struct Venue {
    id: String,
    floors: Vec<FloorInfo>,
    geofence: GeofenceIndex,
    graph: WalkGraph,
    areas: Vec<Area>,
}

impl Venue {
    /// Validate venue data and build the indexes.
    pub fn load(data: VenueData) -> Result<Arc<Self>> {
        let VenueData {
            venue_id,
            mut floors,
            nodes,
            edges,
            zones,
            areas,
        } = data;

        if floors.is_empty() {
            return Err(NavError::InvalidVenue("venue has no floors".to_string()));
        }
        floors.sort_by_key(|f| f.level);
        if floors.windows(2).any(|w| w[0].level == w[1].level) {
            return Err(NavError::InvalidVenue("duplicate floor level".to_string()));
        }
        let levels: HashSet<i32> = floors.iter().map(|f| f.level).collect();
        let check_floor = |floor: i32, what: &str| -> Result<()> {
            if levels.contains(&floor) {
                Ok(())
            } else {
                Err(NavError::InvalidVenue(format!(
                    "{} is on unknown floor {}",
                    what, floor
                )))
            }
        };

        for node in &nodes {
            check_floor(node.coordinate.floor, &format!("node '{}'", node.id))?;
        }
        for zone in &zones {
            check_floor(zone.floor, &format!("zone '{}'", zone.id))?;
            if zone.polygon.len() < 3 {
                return Err(NavError::InvalidVenue(format!(
                    "zone '{}' polygon needs at least 3 points",
                    zone.id
                )));
            }
        }

        let geofence = GeofenceIndex::new(zones);
        let graph = WalkGraph::build(&nodes, &edges, &geofence)?;

        let mut resolved = Vec::with_capacity(areas.len());
        for area in areas {
            check_floor(area.floor, &format!("area '{}'", area.id))?;
            if area.polygon.len() < 3 {
                return Err(NavError::InvalidVenue(format!(
                    "area '{}' polygon needs at least 3 points",
                    area.id
                )));
            }
            let entrance = match &area.entrance {
                Some(key) => {
                    let id = graph.node_id(key).ok_or_else(|| {
                        NavError::InvalidVenue(format!(
                            "area '{}' entrance '{}' is not a graph node",
                            area.id, key
                        ))
                    })?;
                    if graph.node(id).coordinate.floor != area.floor {
                        return Err(NavError::InvalidVenue(format!(
                            "area '{}' entrance is on another floor",
                            area.id
                        )));
                    }
                    Some(id)
                }
                None => None,
            };
            let floor = area.floor;
            resolved.push(Area {
                id: area.id,
                name: area.name,
                floor,
                polygon: area.polygon.into_iter().map(|c| c.on_floor(floor)).collect(),
                entrance,
                category: area.category,
            });
        }

        info!(
            "Venue '{}' loaded: {} floors, {} nodes, {} edges, {} zones, {} areas",
            venue_id,
            floors.len(),
            graph.node_count(),
            graph.edge_count(),
            geofence.len(),
            resolved.len()
        );

        Ok(Arc::new(Self {
            id: venue_id,
            floors,
            geofence,
            graph,
            areas: resolved,
        }))
    }

    /// Venue identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Floors in ascending level order
    pub fn floors(&self) -> &[FloorInfo] {
        &self.floors
    }

    /// Floor levels in ascending order
    pub fn levels(&self) -> Vec<i32> {
        self.floors.iter().map(|f| f.level).collect()
    }

    /// Check if a floor level exists
    pub fn has_floor(&self, floor: i32) -> bool {
        self.floors.iter().any(|f| f.level == floor)
    }

    /// Fail with `InvalidFloor` unless the level exists
    pub fn check_floor(&self, floor: i32) -> Result<()> {
        if self.has_floor(floor) {
            Ok(())
        } else {
            Err(NavError::InvalidFloor { floor })
        }
    }

    /// Floor plan identifier for the positioning service
    pub fn floor_plan_ref(&self, floor: i32) -> Result<&str> {
        self.floors
            .iter()
            .find(|f| f.level == floor)
            .map(|f| f.floor_plan_ref.as_str())
            .ok_or(NavError::InvalidFloor { floor })
    }

    /// All floor plan identifiers, in level order
    pub fn floor_plan_refs(&self) -> Vec<&str> {
        self.floors.iter().map(|f| f.floor_plan_ref.as_str()).collect()
    }

    pub fn geofence(&self) -> &GeofenceIndex {
        &self.geofence
    }

    pub fn graph(&self) -> &WalkGraph {
        &self.graph
    }

    /// All areas in load order
    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    /// Area by id
    pub fn area(&self, id: &str) -> Result<&Area> {
        self.areas
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| NavError::UnknownArea(id.to_string()))
    }

    /// First area containing the point, if any
    pub fn area_at(&self, point: &Coordinate) -> Option<&Area> {
        self.areas.iter().find(|a| a.contains(point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VENUE: &str = r#"
        venue_id = "mall"

        [[floors]]
        level = 1
        name = "First"
        floor_plan_ref = "fp-1"

        [[floors]]
        level = 0
        name = "Ground"
        floor_plan_ref = "fp-0"

        [[nodes]]
        id = "door"
        coordinate = { latitude = 0.0, longitude = 0.0, floor = 0 }

        [[nodes]]
        id = "hall"
        coordinate = { latitude = 0.0, longitude = 0.0005, floor = 0 }
        section = "main-hall"

        [[edges]]
        from = "door"
        to = "hall"

        [[zones]]
        id = "promo"
        name = "Promo"
        floor = 0
        kind = "promo"
        offers = ["2 for 1"]
        polygon = [
            { latitude = -0.001, longitude = -0.001 },
            { latitude = -0.001, longitude = 0.001 },
            { latitude = 0.001, longitude = 0.001 },
        ]

        [[areas]]
        id = "store-1"
        name = "Shoes"
        floor = 0
        entrance = "door"
        polygon = [
            { latitude = 0.0, longitude = -0.001 },
            { latitude = 0.001, longitude = -0.001 },
            { latitude = 0.001, longitude = 0.0 },
            { latitude = 0.0, longitude = 0.0 },
        ]
    "#;

    #[test]
    fn test_load_from_toml() {
        let venue = Venue::load(VenueData::from_toml(VENUE).unwrap()).unwrap();
        assert_eq!(venue.id(), "mall");
        assert_eq!(venue.levels(), vec![0, 1]);
        assert_eq!(venue.floor_plan_ref(1).unwrap(), "fp-1");
        assert_eq!(venue.floor_plan_refs(), vec!["fp-0", "fp-1"]);
        assert_eq!(venue.graph().node_count(), 2);
        assert_eq!(venue.geofence().len(), 1);
        assert_eq!(venue.areas()[0].entrance, Some(0));
    }

    #[test]
    fn test_area_queries() {
        let venue = Venue::load(VenueData::from_toml(VENUE).unwrap()).unwrap();
        let inside = Coordinate::new(0.0005, -0.0005, 0);
        assert_eq!(venue.area_at(&inside).map(|a| a.id.as_str()), Some("store-1"));
        assert!(venue.area_at(&inside.on_floor(1)).is_none());
        assert!(venue.area("store-1").is_ok());
        assert!(matches!(venue.area("nope"), Err(NavError::UnknownArea(_))));
    }

    #[test]
    fn test_unknown_floor_lookup() {
        let venue = Venue::load(VenueData::from_toml(VENUE).unwrap()).unwrap();
        assert!(matches!(
            venue.floor_plan_ref(7),
            Err(NavError::InvalidFloor { floor: 7 })
        ));
        assert!(venue.check_floor(0).is_ok());
    }

    #[test]
    fn test_node_on_unknown_floor_rejected() {
        let mut data = VenueData::from_toml(VENUE).unwrap();
        data.nodes[0].coordinate.floor = 9;
        assert!(matches!(Venue::load(data), Err(NavError::InvalidVenue(_))));
    }

    #[test]
    fn test_bad_entrance_rejected() {
        let mut data = VenueData::from_toml(VENUE).unwrap();
        data.areas[0].entrance = Some("missing".to_string());
        assert!(matches!(Venue::load(data), Err(NavError::InvalidVenue(_))));
    }

    #[test]
    fn test_empty_floors_rejected() {
        let data = VenueData {
            venue_id: "empty".to_string(),
            ..Default::default()
        };
        assert!(matches!(Venue::load(data), Err(NavError::InvalidVenue(_))));
    }
}

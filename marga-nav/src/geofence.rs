//! Geofenced zone lookup.
//!
//! Zones are indexed per floor in an R-tree over their bounding boxes.
//! Candidates from the tree are confirmed with the exact polygon test, so
//! the tree only has to be conservative.

use std::collections::{BTreeSet, HashMap};

use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};

use crate::geo::{Coordinate, polygon_contains};

/// What a zone is for, with its kind-specific payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZoneKind {
    /// Promotional area with its offers
    Promo {
        #[serde(default)]
        offers: Vec<String>,
    },
    /// Elevator/escalator/stair region connecting floors
    FloorChange { target_floors: Vec<i32> },
}

/// A geofenced polygon on a single floor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub floor: i32,
    pub polygon: Vec<Coordinate>,
    #[serde(flatten)]
    pub kind: ZoneKind,
}

impl Zone {
    /// Check if the zone contains a point (same floor, inclusive boundary)
    pub fn contains(&self, point: &Coordinate) -> bool {
        point.floor == self.floor && polygon_contains(&self.polygon, point)
    }

    /// Check if this zone is a floor change region reaching `floor`
    pub fn reaches_floor(&self, floor: i32) -> bool {
        match &self.kind {
            ZoneKind::FloorChange { target_floors } => target_floors.contains(&floor),
            ZoneKind::Promo { .. } => false,
        }
    }

    fn bounding_box(&self) -> AABB<[f64; 2]> {
        let mut min = [f64::INFINITY, f64::INFINITY];
        let mut max = [f64::NEG_INFINITY, f64::NEG_INFINITY];
        for c in &self.polygon {
            min[0] = min[0].min(c.longitude);
            min[1] = min[1].min(c.latitude);
            max[0] = max[0].max(c.longitude);
            max[1] = max[1].max(c.latitude);
        }
        AABB::from_corners(min, max)
    }
}

/// Zone reference stored in the R-tree.
#[derive(Clone, Debug)]
struct IndexedZone {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedZone {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Read-only spatial index of venue zones.
#[derive(Clone, Debug, Default)]
pub struct GeofenceIndex {
    zones: Vec<Zone>,
    trees: HashMap<i32, RTree<IndexedZone>>,
}

impl GeofenceIndex {
    /// Build the index. Polygon vertices are pinned to their zone's floor.
    pub fn new(zones: Vec<Zone>) -> Self {
        let zones: Vec<Zone> = zones
            .into_iter()
            .map(|mut z| {
                let floor = z.floor;
                z.polygon.iter_mut().for_each(|c| c.floor = floor);
                z
            })
            .collect();

        let mut per_floor: HashMap<i32, Vec<IndexedZone>> = HashMap::new();
        for (index, zone) in zones.iter().enumerate() {
            per_floor.entry(zone.floor).or_default().push(IndexedZone {
                index,
                envelope: zone.bounding_box(),
            });
        }

        let trees = per_floor
            .into_iter()
            .map(|(floor, items)| (floor, RTree::bulk_load(items)))
            .collect();

        Self { zones, trees }
    }

    /// Number of zones
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Check if the index holds no zones
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// All zones, in load order
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Zone by id
    pub fn zone(&self, id: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id == id)
    }

    /// Zones on the point's floor whose polygon contains it, in load order.
    pub fn zones_containing(&self, point: &Coordinate) -> Vec<&Zone> {
        self.indices_containing(point)
            .into_iter()
            .map(|i| &self.zones[i])
            .collect()
    }

    /// First floor change zone containing `point` that reaches `target_floor`.
    pub fn floor_change_zone(&self, point: &Coordinate, target_floor: i32) -> Option<&Zone> {
        self.zones_containing(point)
            .into_iter()
            .find(|z| z.reaches_floor(target_floor))
    }

    fn indices_containing(&self, point: &Coordinate) -> Vec<usize> {
        let Some(tree) = self.trees.get(&point.floor) else {
            return Vec::new();
        };

        let probe = AABB::from_point([point.longitude, point.latitude]);
        let mut hits: Vec<usize> = tree
            .locate_in_envelope_intersecting(&probe)
            .map(|item| item.index)
            .filter(|&i| self.zones[i].contains(point))
            .collect();
        hits.sort_unstable();
        hits
    }
}

/// Direction of a membership change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoneTransitionKind {
    Enter,
    Exit,
}

/// A zone the user entered or left on the latest update.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneTransition {
    pub kind: ZoneTransitionKind,
    pub zone: Zone,
}

/// The set of zones currently containing the user.
///
/// Membership is recomputed from scratch on every update and diffed against
/// the previous set, so a teleporting fix can never leave a stale entry.
#[derive(Clone, Debug, Default)]
pub struct ZoneMembership {
    inside: BTreeSet<usize>,
}

impl ZoneMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute membership at `point` and return the changes.
    ///
    /// Exits are listed before enters, each group in zone load order.
    pub fn update(&mut self, index: &GeofenceIndex, point: &Coordinate) -> Vec<ZoneTransition> {
        let now: BTreeSet<usize> = index.indices_containing(point).into_iter().collect();

        let exits = self.inside.difference(&now).map(|&i| ZoneTransition {
            kind: ZoneTransitionKind::Exit,
            zone: index.zones[i].clone(),
        });
        let enters = now.difference(&self.inside).map(|&i| ZoneTransition {
            kind: ZoneTransitionKind::Enter,
            zone: index.zones[i].clone(),
        });
        let transitions: Vec<ZoneTransition> = exits.chain(enters).collect();

        self.inside = now;
        transitions
    }

    /// Number of zones the user is inside
    pub fn len(&self) -> usize {
        self.inside.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inside.is_empty()
    }

    /// Leave every zone (venue unload), returning one exit per zone left.
    pub fn exit_all(&mut self, index: &GeofenceIndex) -> Vec<ZoneTransition> {
        std::mem::take(&mut self.inside)
            .into_iter()
            .filter_map(|i| index.zones.get(i))
            .map(|zone| ZoneTransition {
                kind: ZoneTransitionKind::Exit,
                zone: zone.clone(),
            })
            .collect()
    }
}

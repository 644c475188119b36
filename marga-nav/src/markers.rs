//! Buddy tracking markers.
//!
//! Independent of navigation: the host pushes positions for other people
//! and reads them back for rendering.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{NavError, Result};
use crate::geo::Coordinate;

/// One tracked buddy.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackingMarker {
    pub id: String,
    pub position: Coordinate,
    /// Position updates received since the marker was added
    pub updates: u64,
}

impl TrackingMarker {
    pub fn floor(&self) -> i32 {
        self.position.floor
    }
}

/// Set of tracking markers keyed by buddy id.
#[derive(Clone, Debug, Default)]
pub struct TrackingMarkers {
    markers: BTreeMap<String, TrackingMarker>,
}

impl TrackingMarkers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a marker. Fails if the id is already tracked.
    pub fn add(&mut self, id: &str, position: Coordinate) -> Result<()> {
        if self.markers.contains_key(id) {
            return Err(NavError::DuplicateMarker(id.to_string()));
        }
        debug!("Tracking marker '{}' added on floor {}", id, position.floor);
        self.markers.insert(
            id.to_string(),
            TrackingMarker {
                id: id.to_string(),
                position,
                updates: 0,
            },
        );
        Ok(())
    }

    /// Move a marker
    pub fn update(&mut self, id: &str, position: Coordinate) -> Result<()> {
        let marker = self
            .markers
            .get_mut(id)
            .ok_or_else(|| NavError::UnknownMarker(id.to_string()))?;
        marker.position = position;
        marker.updates += 1;
        Ok(())
    }

    /// Stop tracking a marker, returning its last state
    pub fn remove(&mut self, id: &str) -> Result<TrackingMarker> {
        self.markers
            .remove(id)
            .ok_or_else(|| NavError::UnknownMarker(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Option<&TrackingMarker> {
        self.markers.get(id)
    }

    /// Markers ordered by id
    pub fn iter(&self) -> impl Iterator<Item = &TrackingMarker> {
        self.markers.values()
    }

    /// Markers currently on `floor`
    pub fn on_floor(&self, floor: i32) -> impl Iterator<Item = &TrackingMarker> {
        self.markers.values().filter(move |m| m.floor() == floor)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn clear(&mut self) {
        self.markers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_update_remove() {
        let mut markers = TrackingMarkers::new();
        markers.add("ana", Coordinate::new(1.0, 1.0, 0)).unwrap();
        markers.update("ana", Coordinate::new(1.1, 1.0, 2)).unwrap();

        let ana = markers.get("ana").unwrap();
        assert_eq!(ana.floor(), 2);
        assert_eq!(ana.updates, 1);

        let removed = markers.remove("ana").unwrap();
        assert_eq!(removed.position, Coordinate::new(1.1, 1.0, 2));
        assert!(markers.is_empty());
    }

    #[test]
    fn test_duplicate_and_unknown() {
        let mut markers = TrackingMarkers::new();
        markers.add("ana", Coordinate::new(1.0, 1.0, 0)).unwrap();
        assert!(matches!(
            markers.add("ana", Coordinate::new(0.0, 0.0, 0)),
            Err(NavError::DuplicateMarker(_))
        ));
        assert!(matches!(
            markers.update("bo", Coordinate::new(0.0, 0.0, 0)),
            Err(NavError::UnknownMarker(_))
        ));
        assert!(matches!(markers.remove("bo"), Err(NavError::UnknownMarker(_))));
    }

    #[test]
    fn test_floor_filter_and_order() {
        let mut markers = TrackingMarkers::new();
        markers.add("zed", Coordinate::new(0.0, 0.0, 1)).unwrap();
        markers.add("amy", Coordinate::new(0.0, 0.0, 1)).unwrap();
        markers.add("kim", Coordinate::new(0.0, 0.0, 0)).unwrap();

        let ids: Vec<_> = markers.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["amy", "kim", "zed"]);
        assert_eq!(markers.on_floor(1).count(), 2);

        markers.clear();
        assert_eq!(markers.len(), 0);
    }
}

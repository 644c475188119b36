//! Route geometry exchange format.
//!
//! Routes travel to and from rendering layers as a GeoJSON
//! `FeatureCollection`, one `LineString` feature per segment in route
//! order. Positions are `[longitude, latitude]`; floors ride in the
//! feature properties.

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};
use crate::geo::Coordinate;
use crate::routing::{FloorTransition, Route, RouteSegment};

const FEATURE_COLLECTION: &str = "FeatureCollection";
const FEATURE: &str = "Feature";
const LINE_STRING: &str = "LineString";

/// Two rendered vertices closer than this match (meters).
const MATCH_TOLERANCE_M: f64 = 0.5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: LineString,
    pub properties: SegmentProperties,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineString {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[longitude, latitude]` pairs
    pub coordinates: Vec<[f64; 2]>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentProperties {
    pub index: usize,
    #[serde(default)]
    pub section: Option<String>,
    pub instruction: String,
    /// Floor the segment ends on
    pub floor: i32,
    /// Floor of every vertex; derived from `floor`/`transition` when absent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub floors: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<FloorTransition>,
}

/// Convert a route into a feature collection
pub fn to_feature_collection(route: &Route) -> FeatureCollection {
    let features = route
        .segments()
        .iter()
        .enumerate()
        .map(|(index, segment)| Feature {
            kind: FEATURE.to_string(),
            geometry: LineString {
                kind: LINE_STRING.to_string(),
                coordinates: segment.points.iter().map(Coordinate::lon_lat).collect(),
            },
            properties: SegmentProperties {
                index,
                section: segment.section.clone(),
                instruction: segment.instruction.clone(),
                floor: segment.floor,
                floors: segment.points.iter().map(|p| p.floor).collect(),
                transition: segment.transition.clone(),
            },
        })
        .collect();

    FeatureCollection {
        kind: FEATURE_COLLECTION.to_string(),
        features,
    }
}

/// Serialize a route as GeoJSON text
pub fn to_json(route: &Route) -> Result<String> {
    Ok(serde_json::to_string(&to_feature_collection(route))?)
}

/// Parse GeoJSON text back into a route.
///
/// Features are ordered by their `index` property.
pub fn route_from_json(json: &str) -> Result<Route> {
    let collection: FeatureCollection = serde_json::from_str(json)?;
    route_from_collection(collection)
}

/// Rebuild a route from a parsed feature collection
pub fn route_from_collection(mut collection: FeatureCollection) -> Result<Route> {
    if collection.kind != FEATURE_COLLECTION {
        return Err(NavError::Exchange(format!(
            "expected {}, found {}",
            FEATURE_COLLECTION, collection.kind
        )));
    }
    if collection.features.is_empty() {
        return Err(NavError::Exchange("feature collection has no segments".to_string()));
    }

    collection.features.sort_by_key(|f| f.properties.index);

    let mut segments = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        segments.push(segment_from_feature(feature)?);
    }
    Route::new(segments).map_err(|_| NavError::Exchange("route geometry is empty".to_string()))
}

fn segment_from_feature(feature: Feature) -> Result<RouteSegment> {
    let index = feature.properties.index;
    if feature.kind != FEATURE || feature.geometry.kind != LINE_STRING {
        return Err(NavError::Exchange(format!(
            "segment {}: expected a {} {}",
            index, LINE_STRING, FEATURE
        )));
    }
    let coords = feature.geometry.coordinates;
    if coords.is_empty() {
        return Err(NavError::Exchange(format!("segment {} has no coordinates", index)));
    }

    let props = feature.properties;
    let floors = if props.floors.is_empty() {
        // Every vertex but the arrival sits on the departure floor of a hop
        let departure = props.transition.as_ref().map_or(props.floor, |t| t.from_floor);
        (0..coords.len())
            .map(|i| if i + 1 == coords.len() { props.floor } else { departure })
            .collect()
    } else if props.floors.len() == coords.len() {
        props.floors
    } else {
        return Err(NavError::Exchange(format!(
            "segment {}: {} floors for {} coordinates",
            index,
            props.floors.len(),
            coords.len()
        )));
    };

    let points: Vec<Coordinate> = coords
        .iter()
        .zip(&floors)
        .map(|([lon, lat], &floor)| Coordinate::new(*lat, *lon, floor))
        .collect();

    Ok(RouteSegment {
        length_m: RouteSegment::walked_length(&points),
        points,
        section: props.section,
        instruction: props.instruction,
        floor: props.floor,
        transition: props.transition,
    })
}

/// Check that `rendered` describes the same geometry as `route`.
///
/// Segment count, instructions, floors and vertices must match; vertices
/// may differ by rounding.
pub fn matches_route(rendered: &Route, route: &Route) -> bool {
    rendered.len() == route.len()
        && rendered.segments().iter().zip(route.segments()).all(|(a, b)| {
            a.instruction == b.instruction
                && a.floor == b.floor
                && a.points.len() == b.points.len()
                && a
                    .points
                    .iter()
                    .zip(&b.points)
                    .all(|(p, q)| p.floor == q.floor && p.distance_m(q) <= MATCH_TOLERANCE_M)
        })
}

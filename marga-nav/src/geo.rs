//! Geographic coordinate types and planar geometry helpers.
//!
//! Venues are small enough that distances are computed on a local
//! east/north tangent plane around a reference coordinate. Haversine is
//! used where the two points can be far apart (snapping, heuristics).

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A position inside the venue: latitude/longitude plus floor level.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Floor level (venue defined, 0 is the usual ground reference)
    #[serde(default)]
    pub floor: i32,
}

impl Coordinate {
    /// Create a new coordinate
    #[inline]
    pub fn new(latitude: f64, longitude: f64, floor: i32) -> Self {
        Self {
            latitude,
            longitude,
            floor,
        }
    }

    /// Same position on another floor
    #[inline]
    pub fn on_floor(&self, floor: i32) -> Self {
        Self { floor, ..*self }
    }

    /// Great-circle distance in meters. Floors are ignored.
    pub fn distance_m(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// Initial bearing towards another coordinate (degrees, clockwise from north)
    pub fn bearing_deg(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let y = dlon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
        (y.atan2(x).to_degrees() + 360.0) % 360.0
    }

    /// `[longitude, latitude]` pair, GeoJSON axis order
    #[inline]
    pub fn lon_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

/// Point on the local tangent plane (meters east/north of a reference).
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct LocalPoint {
    pub east: f64,
    pub north: f64,
}

impl LocalPoint {
    #[inline]
    pub fn new(east: f64, north: f64) -> Self {
        Self { east, north }
    }

    #[inline]
    pub fn distance(&self, other: &LocalPoint) -> f64 {
        let de = self.east - other.east;
        let dn = self.north - other.north;
        (de * de + dn * dn).sqrt()
    }
}

/// Equirectangular projection around a fixed reference coordinate.
#[derive(Clone, Copy, Debug)]
pub struct LocalFrame {
    origin: Coordinate,
    meters_per_deg_lat: f64,
    meters_per_deg_lon: f64,
}

impl LocalFrame {
    /// Create a frame centred on `origin`
    pub fn new(origin: Coordinate) -> Self {
        let meters_per_deg_lat = EARTH_RADIUS_M.to_radians();
        let meters_per_deg_lon = meters_per_deg_lat * origin.latitude.to_radians().cos();
        Self {
            origin,
            meters_per_deg_lat,
            meters_per_deg_lon,
        }
    }

    /// Project a coordinate onto the plane
    #[inline]
    pub fn project(&self, c: &Coordinate) -> LocalPoint {
        LocalPoint::new(
            (c.longitude - self.origin.longitude) * self.meters_per_deg_lon,
            (c.latitude - self.origin.latitude) * self.meters_per_deg_lat,
        )
    }
}

/// Distance from `p` to the segment `a`-`b` (meters, planar).
pub fn distance_to_segment(p: LocalPoint, a: LocalPoint, b: LocalPoint) -> f64 {
    let de = b.east - a.east;
    let dn = b.north - a.north;
    let len_sq = de * de + dn * dn;

    if len_sq < f64::EPSILON {
        // Degenerate segment
        return p.distance(&a);
    }

    let t = (((p.east - a.east) * de + (p.north - a.north) * dn) / len_sq).clamp(0.0, 1.0);
    p.distance(&LocalPoint::new(a.east + t * de, a.north + t * dn))
}

/// Minimum distance from `point` to a polyline, considering only vertices on
/// the point's floor. Returns `None` when no part of the polyline shares the
/// floor.
pub fn distance_to_polyline_m(point: &Coordinate, polyline: &[Coordinate]) -> Option<f64> {
    let frame = LocalFrame::new(*point);
    let p = frame.project(point);

    let mut best: Option<f64> = None;
    let mut consider = |d: f64| {
        best = Some(best.map_or(d, |b: f64| b.min(d)));
    };

    for pair in polyline.windows(2) {
        if pair[0].floor == point.floor && pair[1].floor == point.floor {
            consider(distance_to_segment(
                p,
                frame.project(&pair[0]),
                frame.project(&pair[1]),
            ));
        }
    }

    // Single vertices on the floor (isolated by floor transitions)
    for c in polyline.iter().filter(|c| c.floor == point.floor) {
        consider(p.distance(&frame.project(c)));
    }

    best
}

/// Ray-casting point-in-polygon test in lon/lat space.
///
/// Points on an edge or vertex count as inside.
pub fn polygon_contains(polygon: &[Coordinate], point: &Coordinate) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let (px, py) = (point.longitude, point.latitude);
    let mut inside = false;
    let mut j = polygon.len() - 1;

    for i in 0..polygon.len() {
        let (xi, yi) = (polygon[i].longitude, polygon[i].latitude);
        let (xj, yj) = (polygon[j].longitude, polygon[j].latitude);

        if on_segment(px, py, xi, yi, xj, yj) {
            return true;
        }

        if (yi > py) != (yj > py) {
            let x_cross = xi + (py - yi) * (xj - xi) / (yj - yi);
            if px < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }

    inside
}

fn on_segment(px: f64, py: f64, ax: f64, ay: f64, bx: f64, by: f64) -> bool {
    // Relative epsilon so degree-scale inputs still behave
    const EPS: f64 = 1e-12;

    let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
    if cross.abs() > EPS {
        return false;
    }
    px >= ax.min(bx) - EPS && px <= ax.max(bx) + EPS && py >= ay.min(by) - EPS && py <= ay.max(by) + EPS
}

/// Signed difference between two bearings, in (-180, 180].
#[inline]
pub fn bearing_delta_deg(from: f64, to: f64) -> f64 {
    let mut d = (to - from) % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d <= -180.0 {
        d += 360.0;
    }
    d
}

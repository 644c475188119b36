//! User position tracker
//!
//! Normalizes raw positioning fixes into venue coordinates.

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::{NavError, Result};
use crate::geo::Coordinate;
use crate::venue::Venue;

/// Raw fix from the positioning service, with the floor already resolved
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawFix {
    pub latitude: f64,
    pub longitude: f64,
    pub floor: i32,
    /// Horizontal accuracy in meters, if reported
    #[serde(default)]
    pub accuracy_m: Option<f64>,
}

impl RawFix {
    pub fn new(latitude: f64, longitude: f64, floor: i32) -> Self {
        Self {
            latitude,
            longitude,
            floor,
            accuracy_m: None,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude, self.floor)
    }
}

impl From<Coordinate> for RawFix {
    fn from(c: Coordinate) -> Self {
        Self::new(c.latitude, c.longitude, c.floor)
    }
}

/// Latest known user position
#[derive(Clone, Debug, Default)]
pub struct PositionTracker {
    /// Last accepted position
    position: Option<Coordinate>,
    /// Accuracy reported with the last accepted fix
    accuracy_m: Option<f64>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a new fix.
    ///
    /// Fixes on a floor the venue does not have, or with non-finite
    /// coordinates, are dropped and the last position is kept.
    pub fn update(&mut self, venue: &Venue, fix: RawFix) -> Result<Coordinate> {
        if let Err(e) = venue.check_floor(fix.floor) {
            warn!("Dropping fix on unknown floor {}", fix.floor);
            return Err(e);
        }
        if !fix.latitude.is_finite() || !fix.longitude.is_finite() {
            warn!("Dropping non-finite fix ({}, {})", fix.latitude, fix.longitude);
            return Err(NavError::InvalidFix {
                latitude: fix.latitude,
                longitude: fix.longitude,
            });
        }

        let position = fix.coordinate();
        trace!(
            "Position ({:.6}, {:.6}) F{} acc={:?}",
            position.latitude, position.longitude, position.floor, fix.accuracy_m
        );
        self.position = Some(position);
        self.accuracy_m = fix.accuracy_m;
        Ok(position)
    }

    /// Last accepted position
    pub fn position(&self) -> Option<Coordinate> {
        self.position
    }

    /// Accuracy of the last accepted fix
    pub fn accuracy_m(&self) -> Option<f64> {
        self.accuracy_m
    }

    /// Forget the current position
    pub fn reset(&mut self) {
        self.position = None;
        self.accuracy_m = None;
    }
}

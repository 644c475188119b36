//! Test utilities for MargaNav integration tests.
//!
//! Builds a small two-floor venue:
//!
//! ```text
//! floor 1:                         u2 ── cafe (entrance u2)
//!                                  │
//!                                  u1
//!                                  │
//!                                  u0  (lift)
//!                                  ┆
//! floor 0:  g0 ── g1 ── g2 ── g3 ── g4 ── g5  (lift)
//!                      [promo]
//!
//!           island (disconnected)
//! ```
//!
//! Corridor nodes are 0.0002 degrees (~22m) apart along the equator.

#![allow(dead_code)]

use std::time::Instant;

use crossbeam_channel::Receiver;
use marga_nav::venue::{AreaData, FloorInfo, VenueData};
use marga_nav::routing::{EdgeData, NodeData};
use marga_nav::{Coordinate, MapEvent, MapSession, MargaConfig, Zone, ZoneKind};

/// Corridor node spacing in degrees.
pub const STEP: f64 = 0.0002;

/// Longitude of the lift on both floors.
pub const LIFT_LON: f64 = 5.0 * STEP;

pub fn at(lat: f64, lon: f64, floor: i32) -> Coordinate {
    Coordinate::new(lat, lon, floor)
}

/// Ground floor corridor node `i` (0..=5).
pub fn ground(i: usize) -> Coordinate {
    at(0.0, i as f64 * STEP, 0)
}

/// Upper floor node `i` (0..=2), going north from the lift.
pub fn upper(i: usize) -> Coordinate {
    at(i as f64 * STEP, LIFT_LON, 1)
}

/// Point inside the cafe on floor 1.
pub fn cafe() -> Coordinate {
    at(2.6 * STEP, LIFT_LON, 1)
}

/// Disconnected node on floor 0.
pub fn island() -> Coordinate {
    at(5.0 * STEP, 0.0, 0)
}

fn node(id: &str, c: Coordinate, section: Option<&str>) -> NodeData {
    NodeData {
        id: id.to_string(),
        coordinate: c,
        section: section.map(str::to_string),
    }
}

fn edge(a: &str, b: &str) -> EdgeData {
    EdgeData {
        from: a.to_string(),
        to: b.to_string(),
    }
}

fn square(center: Coordinate, half: f64) -> Vec<Coordinate> {
    vec![
        at(center.latitude - half, center.longitude - half, center.floor),
        at(center.latitude - half, center.longitude + half, center.floor),
        at(center.latitude + half, center.longitude + half, center.floor),
        at(center.latitude + half, center.longitude - half, center.floor),
    ]
}

pub fn venue_data() -> VenueData {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for i in 0..=5 {
        nodes.push(node(&format!("g{}", i), ground(i), Some("main-hall")));
        if i > 0 {
            edges.push(edge(&format!("g{}", i - 1), &format!("g{}", i)));
        }
    }
    for i in 0..=2 {
        nodes.push(node(&format!("u{}", i), upper(i), Some("food-court")));
        if i > 0 {
            edges.push(edge(&format!("u{}", i - 1), &format!("u{}", i)));
        }
    }
    nodes.push(node("cafe-counter", cafe(), Some("cafe")));
    nodes.push(node("island", island(), None));
    edges.push(edge("g5", "u0"));
    edges.push(edge("u2", "cafe-counter"));

    let zones = vec![
        Zone {
            id: "promo-shoes".to_string(),
            name: "Shoe Sale".to_string(),
            floor: 0,
            polygon: square(ground(2), STEP / 4.0),
            kind: ZoneKind::Promo {
                offers: vec!["20% off".to_string()],
            },
        },
        Zone {
            id: "lift-0".to_string(),
            name: "Lift".to_string(),
            floor: 0,
            polygon: square(ground(5), STEP / 4.0),
            kind: ZoneKind::FloorChange { target_floors: vec![1] },
        },
        Zone {
            id: "lift-1".to_string(),
            name: "Lift".to_string(),
            floor: 1,
            polygon: square(upper(0), STEP / 4.0),
            kind: ZoneKind::FloorChange { target_floors: vec![0] },
        },
    ];

    let areas = vec![AreaData {
        id: "cafe".to_string(),
        name: "Cafe".to_string(),
        floor: 1,
        polygon: square(cafe(), STEP / 2.0),
        entrance: Some("u2".to_string()),
        category: Some("food".to_string()),
    }];

    VenueData {
        venue_id: "test-mall".to_string(),
        floors: vec![
            FloorInfo {
                level: 0,
                name: "Ground".to_string(),
                floor_plan_ref: "fp-ground".to_string(),
            },
            FloorInfo {
                level: 1,
                name: "First".to_string(),
                floor_plan_ref: "fp-first".to_string(),
            },
        ],
        nodes,
        edges,
        zones,
        areas,
    }
}

/// Session with the test venue loaded.
pub fn session(config: MargaConfig) -> MapSession {
    let mut session = MapSession::new(config);
    session.load_venue(venue_data()).unwrap();
    session
}

/// Session with an event receiver attached after venue load.
pub fn session_with_events(config: MargaConfig) -> (MapSession, Receiver<MapEvent>) {
    let mut session = session(config);
    let rx = session.subscribe();
    (session, rx)
}

/// Pending events.
pub fn drain(rx: &Receiver<MapEvent>) -> Vec<MapEvent> {
    rx.try_iter().collect()
}

/// Names of pending events.
pub fn names(rx: &Receiver<MapEvent>) -> Vec<&'static str> {
    rx.try_iter().map(|e| e.name()).collect()
}

pub fn count(events: &[MapEvent], name: &str) -> usize {
    events.iter().filter(|e| e.name() == name).count()
}

pub fn now() -> Instant {
    Instant::now()
}

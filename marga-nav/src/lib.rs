//! # Marga-Nav: Indoor Venue Navigation Core
//!
//! Turns a stream of positioning fixes into floor-aware turn-by-turn
//! guidance inside a venue (mall, airport, campus).
//!
//! ## Features
//!
//! - **Geofencing**: promo and floor-change zones per floor, R-tree indexed,
//!   with paired enter/exit events
//! - **Routing**: A* over the venue's walkable graph; floor crossings only
//!   through floor-change zones, each with a fixed penalty
//! - **Off-route detection**: deviation against the current and next
//!   instruction, with a reroute suppression window
//! - **Navigation sessions**: preview and turn-by-turn modes, interruption,
//!   instruction stepping, arrival and reroute give-up
//! - **Tracking markers**: positions of other people, independent of routing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Instant;
//! use marga_nav::{Coordinate, MapSession, MargaConfig, NavMode, RawFix, VenueData};
//!
//! # fn run(venue_toml: &str) -> marga_nav::Result<()> {
//! let mut session = MapSession::new(MargaConfig::default());
//! let events = session.subscribe();
//! session.load_venue(VenueData::from_toml(venue_toml)?)?;
//!
//! let start = Coordinate::new(12.9716, 77.5946, 0);
//! let end = Coordinate::new(12.9720, 77.5950, 1);
//! session.find_route(start, end, true, NavMode::TurnByTurn, Instant::now())?;
//!
//! session.update_position(RawFix::new(12.9717, 77.5946, 0), Instant::now())?;
//! for event in events.try_iter() {
//!     println!("{}", event.name());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Data Flow
//!
//! ```text
//!                 ┌─────────────────┐
//!                 │     RawFix      │
//!                 └────────┬────────┘
//!                          │ PositionTracker
//!                          ▼
//!                 ┌─────────────────┐
//!                 │   Coordinate    │
//!                 └────────┬────────┘
//!                          │
//!         ┌────────────────┼────────────────┐
//!         ▼                ▼                ▼
//! ┌───────────────┐ ┌───────────────┐ ┌───────────────┐
//! │ GeofenceIndex │ │ OffRouteDet.  │ │  RouteEngine  │
//! │ (enter/exit)  │ │ (suppression) │ │  (A*, floors) │
//! └───────┬───────┘ └───────┬───────┘ └───────┬───────┘
//!         │                 ▼                 │
//!         │        ┌─────────────────┐        │
//!         └───────►│   MapSession    │◄───────┘
//!                  └────────┬────────┘
//!                           │ MapEvent
//!                           ▼
//!                  ┌─────────────────┐
//!                  │    EventBus     │
//!                  └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`geo`]: coordinates, distances, point-in-polygon
//! - [`venue`]: venue data, validation, area queries
//! - [`geofence`]: zone index and membership diffing
//! - [`tracker`]: position normalization
//! - [`routing`]: walk graph, A*, route segments, request tickets
//! - [`off_route`]: deviation and suppression
//! - [`navigation`]: session state machine
//! - [`markers`]: tracking markers
//! - [`events`]: event enum and subscription
//! - [`exchange`]: GeoJSON route geometry

pub mod config;
pub mod error;
pub mod events;
pub mod exchange;
pub mod geo;
pub mod geofence;
pub mod markers;
pub mod navigation;
pub mod off_route;
pub mod routing;
pub mod tracker;
pub mod venue;

pub use config::{MapConfig, MargaConfig, NavigationConfig};
pub use error::{NavError, Result};
pub use events::{EventBus, FloorChangeSource, MapEvent};
pub use geo::Coordinate;
pub use geofence::{GeofenceIndex, Zone, ZoneKind, ZoneMembership, ZoneTransition, ZoneTransitionKind};
pub use markers::{TrackingMarker, TrackingMarkers};
pub use navigation::{MapSession, NavMode, NavOutcome, NavigationSession, PendingRoute, RouteOutcome, RouteRequest};
pub use off_route::{OffRouteDetector, OffRouteSignal};
pub use routing::{FloorTransition, Route, RouteEngine, RouteEngineConfig, RouteRequests, RouteSegment, RouteTicket};
pub use tracker::{PositionTracker, RawFix};
pub use venue::{Area, AreaData, FloorInfo, Venue, VenueData};

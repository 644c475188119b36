//! Map session: the navigation core of one map instance.
//!
//! [`MapSession`] owns every piece of mutable state (position, zone
//! membership, navigation session, tracking markers) and runs the update
//! cycle:
//!
//! ```text
//! RawFix ─► PositionTracker ─► floor change ─► zone diff ─► guidance
//!                                                           │
//!                       ┌───────────── arrival ◄────────────┤
//!                       │              instruction advance ◄┤
//!                       ▼                                   ▼
//!                   EventBus ◄──── reroute / interrupt ◄─ OffRouteDetector
//! ```
//!
//! The session is not internally synchronized; position updates must be
//! serialized by the host. Route computation can be moved off-thread with
//! [`MapSession::begin_route_request`] / [`MapSession::complete_route_request`].

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use crate::config::MargaConfig;
use crate::error::{NavError, Result};
use crate::events::{EventBus, FloorChangeSource, MapEvent};
use crate::exchange;
use crate::geo::Coordinate;
use crate::geofence::{Zone, ZoneMembership, ZoneTransitionKind};
use crate::markers::{TrackingMarker, TrackingMarkers};
use crate::off_route::{OffRouteDetector, OffRouteSignal};
use crate::routing::{Route, RouteEngine, RouteEngineConfig, RouteRequests, RouteSegment, RouteTicket};
use crate::tracker::{PositionTracker, RawFix};
use crate::venue::{Area, FloorInfo, Venue, VenueData};

use super::state::{NavMode, NavOutcome, NavigationSession, RouteRequest};

/// A route request that can be computed on any thread.
#[derive(Clone, Debug)]
pub struct PendingRoute {
    engine: RouteEngine,
    request: RouteRequest,
    mode: NavMode,
    ticket: RouteTicket,
}

impl PendingRoute {
    pub fn request(&self) -> &RouteRequest {
        &self.request
    }

    pub fn ticket_id(&self) -> u64 {
        self.ticket.id()
    }

    /// Run the search. Aborts early once a newer request supersedes it.
    pub fn compute(self) -> RouteOutcome {
        let result = self.engine.find_route_cancellable(
            self.request.start,
            self.request.end,
            self.request.cut_at_entrance,
            &self.ticket,
        );
        RouteOutcome {
            request: self.request,
            mode: self.mode,
            ticket: self.ticket,
            result,
        }
    }
}

/// Result of a [`PendingRoute`], handed back to the session.
#[derive(Debug)]
pub struct RouteOutcome {
    request: RouteRequest,
    mode: NavMode,
    ticket: RouteTicket,
    result: Result<Route>,
}

impl RouteOutcome {
    pub fn result(&self) -> &Result<Route> {
        &self.result
    }
}

/// Navigation core of one map instance.
pub struct MapSession {
    config: MargaConfig,
    venue: Option<Arc<Venue>>,
    engine: Option<RouteEngine>,
    tracker: PositionTracker,
    zones: ZoneMembership,
    navigation: NavigationSession,
    markers: TrackingMarkers,
    events: EventBus,
    requests: RouteRequests,
    current_floor: Option<i32>,
}

impl MapSession {
    pub fn new(config: MargaConfig) -> Self {
        let detector = OffRouteDetector::from_config(&config.navigation);
        Self {
            config,
            venue: None,
            engine: None,
            tracker: PositionTracker::new(),
            zones: ZoneMembership::new(),
            navigation: NavigationSession::new(detector),
            markers: TrackingMarkers::new(),
            events: EventBus::new(),
            requests: RouteRequests::new(),
            current_floor: None,
        }
    }

    pub fn config(&self) -> &MargaConfig {
        &self.config
    }

    /// Register an event subscriber
    pub fn subscribe(&mut self) -> Receiver<MapEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // Venue
    // ========================================================================

    /// Validate and install venue data, replacing any loaded venue.
    pub fn load_venue(&mut self, data: VenueData) -> Result<()> {
        let venue = Venue::load(data)?;
        self.install_venue(venue);
        Ok(())
    }

    /// Install an already loaded venue.
    pub fn install_venue(&mut self, venue: Arc<Venue>) {
        if self.venue.is_some() {
            self.unload_venue();
        }

        let engine = RouteEngine::new(Arc::clone(&venue), RouteEngineConfig::from(&self.config.navigation));
        let default_floor = self.config.map.default_floor;
        let floor = if venue.has_floor(default_floor) {
            default_floor
        } else {
            let lowest = venue.levels().first().copied().unwrap_or(default_floor);
            warn!("Default floor {} not in venue, showing floor {}", default_floor, lowest);
            lowest
        };

        info!("Venue '{}' active on floor {}", venue.id(), floor);
        self.events.emit(MapEvent::VenueLoaded {
            venue_id: venue.id().to_string(),
        });
        self.events.emit(MapEvent::ActiveFloorList {
            floors: venue.floors().to_vec(),
        });
        self.events.emit(MapEvent::FloorChanged {
            floor,
            source: FloorChangeSource::VenueLoad,
        });

        self.current_floor = Some(floor);
        self.engine = Some(engine);
        self.venue = Some(venue);
    }

    /// Drop the venue and everything bound to it. Tracking markers survive.
    pub fn unload_venue(&mut self) {
        let Some(venue) = self.venue.take() else {
            return;
        };
        self.requests.invalidate();
        self.end_session();
        self.engine = None;
        self.tracker.reset();
        for transition in self.zones.exit_all(venue.geofence()) {
            debug!("Zone {:?}: {}", transition.kind, transition.zone.id);
            self.events.emit(MapEvent::ZoneExited { zone: transition.zone });
        }
        self.current_floor = None;
        info!("Venue '{}' unloaded", venue.id());
        self.events.emit(MapEvent::VenueUnloaded {
            venue_id: venue.id().to_string(),
        });
    }

    pub fn venue(&self) -> Option<&Arc<Venue>> {
        self.venue.as_ref()
    }

    fn loaded_venue(&self) -> Result<&Arc<Venue>> {
        self.venue.as_ref().ok_or(NavError::VenueNotLoaded)
    }

    fn loaded_engine(&self) -> Result<&RouteEngine> {
        self.engine.as_ref().ok_or(NavError::VenueNotLoaded)
    }

    /// Floors of the loaded venue, ascending
    pub fn floors(&self) -> Result<&[FloorInfo]> {
        Ok(self.loaded_venue()?.floors())
    }

    /// Floor currently displayed
    pub fn current_floor(&self) -> Option<i32> {
        self.current_floor
    }

    /// Show another floor.
    pub fn change_floor(&mut self, floor: i32) -> Result<()> {
        self.loaded_venue()?.check_floor(floor)?;
        if self.current_floor != Some(floor) {
            self.current_floor = Some(floor);
            self.events.emit(MapEvent::FloorChanged {
                floor,
                source: FloorChangeSource::User,
            });
        }
        Ok(())
    }

    pub fn floor_plan_ref(&self, floor: i32) -> Result<&str> {
        self.loaded_venue()?.floor_plan_ref(floor)
    }

    pub fn floor_plan_refs(&self) -> Result<Vec<&str>> {
        Ok(self.loaded_venue()?.floor_plan_refs())
    }

    /// Area under a tapped point
    pub fn area_at(&self, point: &Coordinate) -> Result<Option<&Area>> {
        Ok(self.loaded_venue()?.area_at(point))
    }

    pub fn area(&self, id: &str) -> Result<&Area> {
        self.loaded_venue()?.area(id)
    }

    pub fn areas(&self) -> Result<&[Area]> {
        Ok(self.loaded_venue()?.areas())
    }

    /// Zones the user is currently inside
    pub fn current_zones(&self) -> Result<Vec<&Zone>> {
        let venue = self.loaded_venue()?;
        Ok(match self.tracker.position() {
            Some(position) => venue.geofence().zones_containing(&position),
            None => Vec::new(),
        })
    }

    // ========================================================================
    // Position
    // ========================================================================

    /// Process one positioning fix.
    ///
    /// Runs floor tracking, zone enter/exit and guidance. Fixes on unknown
    /// floors are dropped with `InvalidFloor` and non-finite fixes with
    /// `InvalidFix`; the last position is kept.
    pub fn update_position(&mut self, fix: RawFix, now: Instant) -> Result<Coordinate> {
        let venue = Arc::clone(self.loaded_venue()?);
        let position = self.tracker.update(&venue, fix)?;

        if self.current_floor != Some(position.floor) {
            self.current_floor = Some(position.floor);
            self.events.emit(MapEvent::FloorChanged {
                floor: position.floor,
                source: FloorChangeSource::Position,
            });
        }

        for transition in self.zones.update(venue.geofence(), &position) {
            debug!("Zone {:?}: {}", transition.kind, transition.zone.id);
            let event = match transition.kind {
                ZoneTransitionKind::Exit => MapEvent::ZoneExited { zone: transition.zone },
                ZoneTransitionKind::Enter => MapEvent::ZoneEntered { zone: transition.zone },
            };
            self.events.emit(event);
        }

        self.guide(&position, now);
        Ok(position)
    }

    /// Place the user explicitly (same path as a fix)
    pub fn set_user_location(&mut self, position: Coordinate, now: Instant) -> Result<Coordinate> {
        self.update_position(RawFix::from(position), now)
    }

    pub fn user_location(&self) -> Option<Coordinate> {
        self.tracker.position()
    }

    /// Turn-by-turn step for one accepted position.
    fn guide(&mut self, position: &Coordinate, now: Instant) {
        if !self.navigation.is_guiding() {
            return;
        }
        let Some(route) = self.navigation.route.as_ref() else {
            return;
        };

        let destination = route.destination();
        if destination.floor == position.floor
            && destination.distance_m(position) <= self.config.navigation.arrival_tolerance_m
        {
            info!("Arrived at destination");
            self.navigation.outcome = NavOutcome::Arrived;
            self.events.emit(MapEvent::NavigationEnded { arrived: true });
            return;
        }

        let signal = self
            .navigation
            .detector
            .evaluate(position, route, self.navigation.instruction_index, now);

        match signal {
            OffRouteSignal::OnTrack => self.advance_instruction(position),
            OffRouteSignal::Deviated { distance_m } => {
                if self.config.map.allow_user_to_interrupt_navigation {
                    info!("Off route by {:.1}m, navigation interrupted", distance_m);
                    self.navigation.interrupted = true;
                    self.events.emit(MapEvent::NavigationInterrupted {
                        position: *position,
                        distance_m,
                    });
                } else {
                    info!("Off route by {:.1}m, rerouting", distance_m);
                    match self.reroute_from(position, now) {
                        // Failures are reported as events
                        Ok(_) | Err(NavError::NoRouteFound) => {}
                        Err(e) => warn!(
                            "Reroute from ({:.6}, {:.6}) failed: {}",
                            position.latitude, position.longitude, e
                        ),
                    }
                }
            }
        }
    }

    /// Move the cursor forward while the next segment is closer than the current one.
    fn advance_instruction(&mut self, position: &Coordinate) {
        let Some(route) = self.navigation.route.as_ref() else {
            return;
        };
        let mut index = self.navigation.instruction_index;
        while index + 1 < route.len() {
            let here = route.distance_to_segments(position, index, 1).unwrap_or(f64::INFINITY);
            let next = route.distance_to_segments(position, index + 1, 1).unwrap_or(f64::INFINITY);
            if next < here {
                index += 1;
            } else {
                break;
            }
        }
        if index != self.navigation.instruction_index {
            self.set_instruction_and_notify(index);
        }
    }

    fn set_instruction_and_notify(&mut self, index: usize) {
        self.navigation.instruction_index = index;
        if let Some(segment) = self.navigation.current_segment() {
            debug!("Instruction {}: {}", index, segment.instruction);
            let segment = segment.clone();
            self.events.emit(MapEvent::InstructionChanged { index, segment });
        }
    }

    // ========================================================================
    // Routing
    // ========================================================================

    /// Compute a route and start navigating it in `mode`.
    ///
    /// Any previous session and in-flight request is discarded first. With
    /// `NavMode::None` the route is reported and returned but no session is
    /// kept.
    pub fn find_route(
        &mut self,
        start: Coordinate,
        end: Coordinate,
        cut_at_entrance: bool,
        mode: NavMode,
        now: Instant,
    ) -> Result<Route> {
        let pending = self.begin_route_request(start, end, cut_at_entrance, mode)?;
        self.complete_route_request(pending.compute(), now)
    }

    /// Start a route request without computing it.
    ///
    /// Supersedes every earlier request and ends the current session.
    pub fn begin_route_request(
        &mut self,
        start: Coordinate,
        end: Coordinate,
        cut_at_entrance: bool,
        mode: NavMode,
    ) -> Result<PendingRoute> {
        let engine = self.loaded_engine()?.clone();
        let ticket = self.requests.issue();
        self.end_session();
        debug!("Route request {} issued", ticket.id());
        Ok(PendingRoute {
            engine,
            request: RouteRequest {
                start,
                end,
                cut_at_entrance,
            },
            mode,
            ticket,
        })
    }

    /// Install the result of a [`PendingRoute`].
    ///
    /// Results of superseded requests are refused with `StaleRouteRequest`.
    pub fn complete_route_request(&mut self, outcome: RouteOutcome, now: Instant) -> Result<Route> {
        let RouteOutcome {
            request,
            mode,
            ticket,
            result,
        } = outcome;

        if !ticket.is_current() {
            debug!("Discarding stale route request {}", ticket.id());
            return Err(NavError::StaleRouteRequest { ticket: ticket.id() });
        }

        let route = match result {
            Ok(route) => route,
            Err(NavError::NoRouteFound) => {
                info!("No route found");
                self.events.emit(MapEvent::NoRouteFound {
                    start: request.start,
                    end: request.end,
                });
                return Err(NavError::NoRouteFound);
            }
            Err(e) => return Err(e),
        };

        self.events.emit(MapEvent::RouteFound {
            route: route.clone(),
            mode,
        });
        if mode == NavMode::None {
            return Ok(route);
        }

        self.navigation.start(route.clone(), request, mode);
        info!("Navigation started in {} mode", mode.as_str());
        self.events.emit(MapEvent::ModeChanged { mode });
        self.set_instruction_and_notify(0);

        if mode == NavMode::TurnByTurn
            && let Some(position) = self.tracker.position()
        {
            self.guide(&position, now);
        }
        Ok(route)
    }

    /// Recompute the active route from `from` to the original destination.
    pub fn reroute(&mut self, from: Coordinate, now: Instant) -> Result<Route> {
        if self.navigation.route.is_none() {
            return Err(NavError::NoActiveRoute);
        }
        self.reroute_from(&from, now)
    }

    fn reroute_from(&mut self, from: &Coordinate, now: Instant) -> Result<Route> {
        let request = self.navigation.request.ok_or(NavError::NoActiveRoute)?;
        let engine = self.loaded_engine()?.clone();
        let ticket = self.requests.issue();

        // Quiet period covers the recomputation and its outcome
        self.navigation.detector.suppress(now);

        match engine.find_route_cancellable(*from, request.end, request.cut_at_entrance, &ticket) {
            Ok(route) => {
                info!(
                    "Rerouted: {} segments, {:.1}m",
                    route.len(),
                    route.length_m()
                );
                self.navigation.replace_route(route.clone(), from);
                self.events.emit(MapEvent::RerouteTriggered {
                    from: *from,
                    route: route.clone(),
                });
                let index = self.navigation.instruction_index;
                self.set_instruction_and_notify(index);
                Ok(route)
            }
            Err(NavError::NoRouteFound) => {
                self.navigation.reroute_failures += 1;
                let consecutive = self.navigation.reroute_failures;
                warn!("Reroute failed ({} in a row)", consecutive);
                self.events.emit(MapEvent::RerouteFailed { consecutive });

                if consecutive >= self.config.navigation.max_reroute_failures {
                    warn!("Giving up after {} failed reroutes", consecutive);
                    self.navigation.outcome = NavOutcome::Failed;
                    self.events.emit(MapEvent::NavigationEnded { arrived: false });
                }
                Err(NavError::NoRouteFound)
            }
            Err(e) => Err(e),
        }
    }

    /// Hold back reroutes for the suppression window starting at `now`.
    pub fn suppress_reroute_event(&mut self, now: Instant) {
        self.navigation.detector.suppress(now);
    }

    // ========================================================================
    // Mode
    // ========================================================================

    pub fn mode(&self) -> NavMode {
        self.navigation.mode
    }

    pub fn navigation(&self) -> &NavigationSession {
        &self.navigation
    }

    pub fn active_route(&self) -> Option<&Route> {
        self.navigation.route()
    }

    /// Switch between preview and turn-by-turn. `None` exits navigation.
    pub fn set_navigation_mode(&mut self, mode: NavMode) -> Result<()> {
        if mode == NavMode::None {
            self.exit_navigation();
            return Ok(());
        }
        if self.navigation.route.is_none() {
            return Err(NavError::NoActiveRoute);
        }
        if self.navigation.mode == mode {
            return Ok(());
        }
        self.navigation.mode = mode;
        if mode == NavMode::Preview {
            self.navigation.interrupted = false;
        }
        info!("Navigation mode {}", mode.as_str());
        self.events.emit(MapEvent::ModeChanged { mode });
        Ok(())
    }

    /// Leave navigation and cancel any in-flight route request. Always succeeds.
    pub fn exit_navigation(&mut self) {
        self.requests.invalidate();
        self.end_session();
    }

    fn end_session(&mut self) {
        let was_active = self.navigation.mode != NavMode::None;
        self.navigation.clear();
        if was_active {
            info!("Navigation exited");
            self.events.emit(MapEvent::ModeChanged { mode: NavMode::None });
        }
    }

    /// Continue after an interruption.
    ///
    /// Guidance resumes on the current route while the user is still near
    /// it, otherwise the route is recomputed from the user's position.
    pub fn resume_navigation(&mut self, now: Instant) -> Result<()> {
        let route = self.navigation.route.as_ref().ok_or(NavError::NoActiveRoute)?;
        if !self.navigation.interrupted {
            return Ok(());
        }

        let compatible = match self.tracker.position() {
            Some(position) => {
                let index = self.navigation.instruction_index;
                let distance = route
                    .distance_to_segments(&position, index, 2)
                    .unwrap_or(f64::INFINITY);
                distance <= self.navigation.detector.tolerance_m()
            }
            None => true,
        };

        self.navigation.interrupted = false;
        if compatible {
            info!("Navigation resumed on current route");
            self.events.emit(MapEvent::NavigationResumed { rerouted: false });
            return Ok(());
        }

        let Some(position) = self.tracker.position() else {
            return Ok(());
        };
        self.reroute_from(&position, now)?;
        info!("Navigation resumed on new route");
        self.events.emit(MapEvent::NavigationResumed { rerouted: true });
        Ok(())
    }

    // ========================================================================
    // Instructions
    // ========================================================================

    /// Current instruction index and segment
    pub fn current_instruction(&self) -> Option<(usize, &RouteSegment)> {
        self.navigation
            .current_segment()
            .map(|s| (self.navigation.instruction_index, s))
    }

    /// Jump to instruction `index`.
    pub fn step_to_instruction(&mut self, index: usize) -> Result<()> {
        self.navigation.set_instruction(index)?;
        self.set_instruction_and_notify(index);
        Ok(())
    }

    /// Next instruction; stays on the last one.
    pub fn next_step(&mut self) -> Result<usize> {
        self.step(true)
    }

    /// Previous instruction; stays on the first one.
    pub fn previous_step(&mut self) -> Result<usize> {
        self.step(false)
    }

    fn step(&mut self, forward: bool) -> Result<usize> {
        let index = self.navigation.clamped_step(forward)?;
        if index != self.navigation.instruction_index {
            self.set_instruction_and_notify(index);
        }
        Ok(index)
    }

    // ========================================================================
    // Route geometry exchange
    // ========================================================================

    /// Active route as GeoJSON
    pub fn route_geometry(&self) -> Result<String> {
        let route = self.navigation.route.as_ref().ok_or(NavError::NoActiveRoute)?;
        exchange::to_json(route)
    }

    /// Check geometry echoed by a rendering layer against the active route.
    pub fn acknowledge_route_geometry(&self, json: &str) -> Result<bool> {
        let route = self.navigation.route.as_ref().ok_or(NavError::NoActiveRoute)?;
        let rendered = exchange::route_from_json(json)?;
        let matches = exchange::matches_route(&rendered, route);
        if !matches {
            warn!("Rendered route geometry does not match the active route");
        }
        Ok(matches)
    }

    // ========================================================================
    // Tracking markers
    // ========================================================================

    pub fn add_tracking_marker(&mut self, id: &str, position: Coordinate) -> Result<()> {
        self.markers.add(id, position)
    }

    pub fn update_tracking_marker(&mut self, id: &str, position: Coordinate) -> Result<()> {
        self.markers.update(id, position)
    }

    pub fn remove_tracking_marker(&mut self, id: &str) -> Result<TrackingMarker> {
        self.markers.remove(id)
    }

    pub fn tracking_markers(&self) -> &TrackingMarkers {
        &self.markers
    }
}

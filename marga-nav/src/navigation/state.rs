//! Navigation session state.
//!
//! [`NavigationSession`] holds the mode, active route, instruction cursor
//! and interruption flag of one map instance. It is plain state; the
//! transitions are driven by [`MapSession`](super::MapSession).

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};
use crate::geo::Coordinate;
use crate::off_route::OffRouteDetector;
use crate::routing::{Route, RouteSegment};

/// Navigation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NavMode {
    /// No active navigation.
    #[default]
    None,

    /// Route overview; no position tracking against the route.
    Preview,

    /// Live guidance with off-route detection and arrival.
    TurnByTurn,
}

impl NavMode {
    /// Convert to string for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            NavMode::None => "NONE",
            NavMode::Preview => "PREVIEW",
            NavMode::TurnByTurn => "TURN_BY_TURN",
        }
    }
}

/// How the current turn-by-turn run has ended, if it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavOutcome {
    /// Still guiding.
    #[default]
    Active,

    /// Reached the destination; the session stays until exited.
    Arrived,

    /// Gave up after repeated reroute failures.
    Failed,
}

/// Route request, replayed on reroute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteRequest {
    pub start: Coordinate,
    pub end: Coordinate,
    pub cut_at_entrance: bool,
}

/// Navigation state of one map instance.
#[derive(Debug, Clone)]
pub struct NavigationSession {
    /// Current mode.
    pub(crate) mode: NavMode,

    /// Active route (present whenever mode is not `None`).
    pub(crate) route: Option<Route>,

    /// Index of the current instruction segment.
    pub(crate) instruction_index: usize,

    /// Deviation paused guidance; waiting for resume.
    pub(crate) interrupted: bool,

    /// Request that produced the route.
    pub(crate) request: Option<RouteRequest>,

    /// Failed automatic reroutes in a row.
    pub(crate) reroute_failures: u32,

    pub(crate) outcome: NavOutcome,

    /// Deviation checks and reroute suppression deadline.
    pub(crate) detector: OffRouteDetector,
}

impl NavigationSession {
    /// Create an idle session.
    pub fn new(detector: OffRouteDetector) -> Self {
        Self {
            mode: NavMode::None,
            route: None,
            instruction_index: 0,
            interrupted: false,
            request: None,
            reroute_failures: 0,
            outcome: NavOutcome::Active,
            detector,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn mode(&self) -> NavMode {
        self.mode
    }

    /// Check if a route is installed.
    pub fn is_active(&self) -> bool {
        self.mode != NavMode::None && self.route.is_some()
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn instruction_index(&self) -> usize {
        self.instruction_index
    }

    /// Segment at the instruction cursor.
    pub fn current_segment(&self) -> Option<&RouteSegment> {
        self.route.as_ref().and_then(|r| r.segment(self.instruction_index))
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn request(&self) -> Option<&RouteRequest> {
        self.request.as_ref()
    }

    pub fn reroute_failures(&self) -> u32 {
        self.reroute_failures
    }

    pub fn outcome(&self) -> NavOutcome {
        self.outcome
    }

    pub fn detector(&self) -> &OffRouteDetector {
        &self.detector
    }

    /// Check if position updates should drive guidance.
    pub(crate) fn is_guiding(&self) -> bool {
        self.mode == NavMode::TurnByTurn
            && self.route.is_some()
            && !self.interrupted
            && self.outcome == NavOutcome::Active
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Install a freshly computed route in `mode`.
    pub(crate) fn start(&mut self, route: Route, request: RouteRequest, mode: NavMode) {
        self.mode = mode;
        self.route = Some(route);
        self.request = Some(request);
        self.instruction_index = 0;
        self.interrupted = false;
        self.reroute_failures = 0;
        self.outcome = NavOutcome::Active;
        self.detector.clear_suppression();
    }

    /// Swap in a rerouted route, keeping mode and destination.
    pub(crate) fn replace_route(&mut self, route: Route, from: &Coordinate) {
        self.instruction_index = route.nearest_segment(from).unwrap_or(0);
        self.route = Some(route);
        self.interrupted = false;
        self.reroute_failures = 0;
    }

    /// Drop route and mode. Always succeeds.
    pub(crate) fn clear(&mut self) {
        self.mode = NavMode::None;
        self.route = None;
        self.request = None;
        self.instruction_index = 0;
        self.interrupted = false;
        self.reroute_failures = 0;
        self.outcome = NavOutcome::Active;
        self.detector.clear_suppression();
    }

    /// Move the cursor to `index`; out of range leaves state unchanged.
    pub(crate) fn set_instruction(&mut self, index: usize) -> Result<()> {
        let len = self.route.as_ref().ok_or(NavError::NoActiveRoute)?.len();
        if index >= len {
            return Err(NavError::IndexOutOfRange { index, len });
        }
        self.instruction_index = index;
        Ok(())
    }

    /// Cursor after one step forward or back, clamped to the route.
    pub(crate) fn clamped_step(&self, forward: bool) -> Result<usize> {
        let len = self.route.as_ref().ok_or(NavError::NoActiveRoute)?.len();
        let index = if forward {
            (self.instruction_index + 1).min(len - 1)
        } else {
            self.instruction_index.saturating_sub(1)
        };
        Ok(index)
    }
}

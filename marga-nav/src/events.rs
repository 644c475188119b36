//! Map events and their delivery.
//!
//! Every notification the core raises is a [`MapEvent`]. Subscribers receive
//! events over crossbeam channels in emission order; a subscriber that drops
//! its receiver is pruned on the next emit.

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::Serialize;
use tracing::trace;

use crate::geo::Coordinate;
use crate::geofence::Zone;
use crate::navigation::NavMode;
use crate::routing::{Route, RouteSegment};
use crate::venue::FloorInfo;

/// What caused the displayed floor to change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FloorChangeSource {
    /// Default floor on venue load
    VenueLoad,
    /// Explicit host request
    User,
    /// The user's position moved to another floor
    Position,
}

/// Notification raised by the navigation core.
#[derive(Clone, Debug, PartialEq)]
pub enum MapEvent {
    VenueLoaded { venue_id: String },
    VenueUnloaded { venue_id: String },
    /// Floors of the loaded venue, ascending
    ActiveFloorList { floors: Vec<FloorInfo> },
    FloorChanged { floor: i32, source: FloorChangeSource },
    ZoneEntered { zone: Zone },
    ZoneExited { zone: Zone },
    RouteFound { route: Route, mode: NavMode },
    NoRouteFound { start: Coordinate, end: Coordinate },
    InstructionChanged { index: usize, segment: RouteSegment },
    /// The route was recomputed from `from`
    RerouteTriggered { from: Coordinate, route: Route },
    /// An automatic reroute failed; `consecutive` counts failures in a row
    RerouteFailed { consecutive: u32 },
    NavigationInterrupted { position: Coordinate, distance_m: f64 },
    NavigationResumed { rerouted: bool },
    NavigationEnded { arrived: bool },
    ModeChanged { mode: NavMode },
}

impl MapEvent {
    /// Short event name for logging
    pub fn name(&self) -> &'static str {
        match self {
            MapEvent::VenueLoaded { .. } => "venue_loaded",
            MapEvent::VenueUnloaded { .. } => "venue_unloaded",
            MapEvent::ActiveFloorList { .. } => "active_floor_list",
            MapEvent::FloorChanged { .. } => "floor_changed",
            MapEvent::ZoneEntered { .. } => "zone_entered",
            MapEvent::ZoneExited { .. } => "zone_exited",
            MapEvent::RouteFound { .. } => "route_found",
            MapEvent::NoRouteFound { .. } => "no_route_found",
            MapEvent::InstructionChanged { .. } => "instruction_changed",
            MapEvent::RerouteTriggered { .. } => "reroute_triggered",
            MapEvent::RerouteFailed { .. } => "reroute_failed",
            MapEvent::NavigationInterrupted { .. } => "navigation_interrupted",
            MapEvent::NavigationResumed { .. } => "navigation_resumed",
            MapEvent::NavigationEnded { .. } => "navigation_ended",
            MapEvent::ModeChanged { .. } => "mode_changed",
        }
    }
}

/// Fan-out of map events to any number of subscribers.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<MapEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. It sees only events emitted after this call.
    pub fn subscribe(&mut self) -> Receiver<MapEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber.
    pub fn emit(&mut self, event: MapEvent) {
        trace!("Event: {}", event.name());
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers (as of the last emit)
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_delivered_in_order() {
        let mut bus = EventBus::new();
        let rx = bus.subscribe();

        bus.emit(MapEvent::NavigationEnded { arrived: true });
        bus.emit(MapEvent::ModeChanged { mode: NavMode::None });

        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            received,
            vec![
                MapEvent::NavigationEnded { arrived: true },
                MapEvent::ModeChanged { mode: NavMode::None },
            ]
        );
    }

    #[test]
    fn test_every_subscriber_receives() {
        let mut bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.emit(MapEvent::RerouteFailed { consecutive: 1 });
        assert_eq!(a.try_iter().count(), 1);
        assert_eq!(b.try_iter().count(), 1);
    }

    #[test]
    fn test_dropped_subscriber_pruned() {
        let mut bus = EventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(MapEvent::NavigationResumed { rerouted: false });
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(keep.try_iter().count(), 1);
    }
}

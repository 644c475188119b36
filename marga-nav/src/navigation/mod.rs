//! Navigation session state machine.
//!
//! # Architecture
//!
//! ```text
//! find_route()                     ← caller picks Preview or TurnByTurn
//!     │
//!     ▼
//! NavigationSession                ← mode, route, instruction cursor
//!     │ interrupted / outcome
//!     │
//!     ▼
//! MapSession::update_position()    ← arrival, off-route, reroute
//! ```
//!
//! # Key Types
//!
//! - [`NavMode`]: `None`, `Preview` or `TurnByTurn`
//! - [`NavigationSession`]: per-map navigation state
//! - [`MapSession`]: owns all mutable state and emits [`MapEvent`](crate::events::MapEvent)s

mod session;
mod state;

pub use session::{MapSession, PendingRoute, RouteOutcome};
pub use state::{NavMode, NavOutcome, NavigationSession, RouteRequest};

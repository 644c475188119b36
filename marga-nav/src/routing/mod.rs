//! Floor-aware routing over the venue's walkable network.
//!
//! - [`graph`]: walkable nodes and edges, inter-floor edges gated by zones
//! - [`astar`]: A* search with a fixed floor transition penalty
//! - [`route`]: segmented route geometry and instruction text
//! - [`ticket`]: cancellation of superseded route requests

pub mod astar;
pub mod graph;
pub mod route;
pub mod ticket;

pub use astar::{RouteEngine, RouteEngineConfig};
pub use graph::{EdgeData, EdgeKind, GraphEdge, GraphNode, NodeData, NodeId, WalkGraph};
pub use route::{FloorTransition, PathPoint, Route, RouteSegment, SegmentBuilder};
pub use ticket::{RouteRequests, RouteTicket};

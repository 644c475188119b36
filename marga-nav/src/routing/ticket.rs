//! Route request generations.
//!
//! Every route request takes a ticket from a shared generation counter.
//! Issuing a newer ticket, or invalidating the counter, makes all older
//! tickets stale: their searches abort and their results are refused.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Issues route tickets for one map session.
#[derive(Clone, Debug, Default)]
pub struct RouteRequests {
    generation: Arc<AtomicU64>,
}

impl RouteRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding every earlier ticket.
    pub fn issue(&self) -> RouteTicket {
        let id = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        RouteTicket {
            id,
            generation: Arc::clone(&self.generation),
        }
    }

    /// Supersede every outstanding ticket without starting a request.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

/// Handle to one route request. Cheap to clone and `Send`.
#[derive(Clone, Debug)]
pub struct RouteTicket {
    id: u64,
    generation: Arc<AtomicU64>,
}

impl RouteTicket {
    /// Ticket that is never superseded (for one-off computations)
    pub fn detached() -> Self {
        Self {
            id: 0,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Check if no newer request has been issued
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::Acquire) == self.id
    }
}

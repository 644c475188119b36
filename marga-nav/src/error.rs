//! Error types for MargaNav

use thiserror::Error;

/// MargaNav error type
#[derive(Error, Debug)]
pub enum NavError {
    #[error("Floor {floor} is not part of the loaded venue")]
    InvalidFloor { floor: i32 },

    #[error("Position ({latitude}, {longitude}) is not a valid coordinate")]
    InvalidFix { latitude: f64, longitude: f64 },

    #[error("No route found between the requested points")]
    NoRouteFound,

    #[error("Venue data has not been loaded")]
    VenueNotLoaded,

    #[error("Instruction index {index} out of range (route has {len} segments)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("No active route")]
    NoActiveRoute,

    #[error("Unknown area: {0}")]
    UnknownArea(String),

    #[error("Unknown tracking marker: {0}")]
    UnknownMarker(String),

    #[error("Tracking marker already exists: {0}")]
    DuplicateMarker(String),

    #[error("Route request {ticket} was superseded by a newer request")]
    StaleRouteRequest { ticket: u64 },

    #[error("Route computation cancelled")]
    RouteCancelled,

    #[error("Invalid venue data: {0}")]
    InvalidVenue(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Route geometry error: {0}")]
    Exchange(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for NavError {
    fn from(e: toml::de::Error) -> Self {
        NavError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for NavError {
    fn from(e: serde_json::Error) -> Self {
        NavError::Exchange(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;

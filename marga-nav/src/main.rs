//! MargaNav - fix trace replay
//!
//! Loads a configuration, a venue snapshot and a trace of positioning
//! fixes, runs them through a [`MapSession`] and logs every event.
//!
//! ```text
//! marga-nav <config.toml> <venue.toml> <trace.toml>
//! ```
//!
//! Trace format:
//!
//! ```toml
//! [route]
//! start = { latitude = 0.0, longitude = 0.0, floor = 0 }
//! end = { latitude = 0.0, longitude = 0.001, floor = 1 }
//! cut_at_entrance = true
//! mode = "TurnByTurn"
//!
//! [[fixes]]
//! at_secs = 0.0
//! latitude = 0.0
//! longitude = 0.0
//! floor = 0
//! ```

use std::path::Path;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use serde::Deserialize;
use tracing::{info, warn};

use marga_nav::{Coordinate, MapEvent, MapSession, MargaConfig, NavError, NavMode, RawFix, Result, VenueData};

/// Route request replayed before the fixes
#[derive(Debug, Deserialize)]
struct TraceRoute {
    start: Coordinate,
    end: Coordinate,
    #[serde(default)]
    cut_at_entrance: bool,
    #[serde(default = "default_mode")]
    mode: NavMode,
}

fn default_mode() -> NavMode {
    NavMode::TurnByTurn
}

/// One fix, stamped relative to the start of the replay
#[derive(Debug, Deserialize)]
struct TraceFix {
    #[serde(default)]
    at_secs: f64,
    #[serde(flatten)]
    fix: RawFix,
}

#[derive(Debug, Deserialize)]
struct Trace {
    #[serde(default)]
    route: Option<TraceRoute>,
    #[serde(default)]
    fixes: Vec<TraceFix>,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("marga_nav=info".parse().unwrap()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!("usage: {} <config.toml> <venue.toml> <trace.toml>", args[0]);
        return Err(NavError::Config("missing arguments".to_string()));
    }

    info!("MargaNav v{}", env!("CARGO_PKG_VERSION"));

    let config_path = Path::new(&args[1]);
    let config = if config_path.exists() {
        info!("Loading configuration from {:?}", config_path);
        MargaConfig::load(config_path)?
    } else {
        info!("Using default configuration");
        MargaConfig::default()
    };

    let venue = VenueData::from_toml(&std::fs::read_to_string(&args[2])?)?;
    let trace: Trace = toml::from_str(&std::fs::read_to_string(&args[3])?)?;
    info!("Replaying {} fixes", trace.fixes.len());

    let mut session = MapSession::new(config);
    let events = session.subscribe();
    session.load_venue(venue)?;
    drain(&events);

    let t0 = Instant::now();

    if let Some(route) = &trace.route {
        match session.find_route(route.start, route.end, route.cut_at_entrance, route.mode, t0) {
            Ok(found) => info!("Route: {} instructions, {:.1}m", found.len(), found.length_m()),
            Err(e) => warn!("Route request failed: {}", e),
        }
        drain(&events);
    }

    for step in &trace.fixes {
        let now = t0 + Duration::from_secs_f64(step.at_secs.max(0.0));
        if let Err(e) = session.update_position(step.fix, now) {
            warn!("t={:.1}s fix dropped: {}", step.at_secs, e);
        }
        drain(&events);
    }

    info!("Replay finished in mode {}", session.mode().as_str());
    Ok(())
}

/// Log every pending event.
fn drain(events: &Receiver<MapEvent>) {
    for event in events.try_iter() {
        match &event {
            MapEvent::InstructionChanged { index, segment } => {
                info!("[{}] #{} {}", event.name(), index, segment.instruction)
            }
            MapEvent::ZoneEntered { zone } | MapEvent::ZoneExited { zone } => {
                info!("[{}] {} ({})", event.name(), zone.name, zone.id)
            }
            MapEvent::FloorChanged { floor, source } => {
                info!("[{}] floor {} ({:?})", event.name(), floor, source)
            }
            MapEvent::NavigationEnded { arrived } => info!("[{}] arrived={}", event.name(), arrived),
            _ => info!("[{}]", event.name()),
        }
    }
}

//! Configuration loading for MargaNav

use crate::error::{NavError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Longest accepted reroute suppression window (seconds)
pub const MAX_REROUTE_SUPPRESSION_SECS: f64 = 3600.0;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MargaConfig {
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
}

/// Map instance options
#[derive(Clone, Debug, Deserialize)]
pub struct MapConfig {
    /// Floor shown when the venue loads (default: 0)
    #[serde(default = "default_floor")]
    pub default_floor: i32,

    /// Pause and notify instead of rerouting when the user leaves the route
    #[serde(default)]
    pub allow_user_to_interrupt_navigation: bool,

    /// Built-in floor selector visibility. Rendering only, carried for the host.
    #[serde(default = "default_enable_floor_selector")]
    pub enable_floor_selector: bool,

    /// Custom tile renderer instead of the standard map. Rendering only.
    #[serde(default)]
    pub use_custom_tiles: bool,
}

/// Routing and turn-by-turn parameters
#[derive(Clone, Debug, Deserialize)]
pub struct NavigationConfig {
    /// Distance from the route beyond which the user counts as deviated (meters)
    #[serde(default = "default_off_route_tolerance")]
    pub off_route_tolerance_m: f64,

    /// Quiet period after a reroute during which deviation is not reported (seconds)
    #[serde(default = "default_reroute_suppression")]
    pub reroute_suppression_secs: f64,

    /// Distance from the destination that counts as arrival (meters)
    #[serde(default = "default_arrival_tolerance")]
    pub arrival_tolerance_m: f64,

    /// Fixed cost added for every floor crossing (meters equivalent)
    #[serde(default = "default_floor_transition_penalty")]
    pub floor_transition_penalty_m: f64,

    /// Consecutive failed reroutes before turn-by-turn gives up
    #[serde(default = "default_max_reroute_failures")]
    pub max_reroute_failures: u32,

    /// Maximum distance from a route endpoint to its nearest walkable node (meters)
    #[serde(default = "default_snap_radius")]
    pub snap_radius_m: f64,

    /// Heading change that starts a new instruction (degrees)
    #[serde(default = "default_turn_angle")]
    pub turn_angle_deg: f64,

    /// Node expansions before the route search gives up
    #[serde(default = "default_max_search_iterations")]
    pub max_search_iterations: usize,
}

impl NavigationConfig {
    /// Reroute suppression window as a duration.
    pub fn suppression_window(&self) -> Duration {
        let secs = self.reroute_suppression_secs;
        if secs.is_nan() {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(secs.clamp(0.0, MAX_REROUTE_SUPPRESSION_SECS))
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            default_floor: default_floor(),
            allow_user_to_interrupt_navigation: false,
            enable_floor_selector: default_enable_floor_selector(),
            use_custom_tiles: false,
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            off_route_tolerance_m: default_off_route_tolerance(),
            reroute_suppression_secs: default_reroute_suppression(),
            arrival_tolerance_m: default_arrival_tolerance(),
            floor_transition_penalty_m: default_floor_transition_penalty(),
            max_reroute_failures: default_max_reroute_failures(),
            snap_radius_m: default_snap_radius(),
            turn_angle_deg: default_turn_angle(),
            max_search_iterations: default_max_search_iterations(),
        }
    }
}

// Default value functions
fn default_floor() -> i32 {
    0
}
fn default_enable_floor_selector() -> bool {
    true
}

// Navigation defaults
fn default_off_route_tolerance() -> f64 {
    10.0
}
fn default_reroute_suppression() -> f64 {
    5.0
}
fn default_arrival_tolerance() -> f64 {
    5.0
}
fn default_floor_transition_penalty() -> f64 {
    30.0
} // roughly a 30m walk per elevator/escalator hop
fn default_max_reroute_failures() -> u32 {
    3
}
fn default_snap_radius() -> f64 {
    50.0
}
fn default_turn_angle() -> f64 {
    35.0
}
fn default_max_search_iterations() -> usize {
    200_000
}

impl MargaConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NavError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: MargaConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let nav = &self.navigation;
        let fields = [
            ("off_route_tolerance_m", nav.off_route_tolerance_m),
            ("reroute_suppression_secs", nav.reroute_suppression_secs),
            ("arrival_tolerance_m", nav.arrival_tolerance_m),
            ("floor_transition_penalty_m", nav.floor_transition_penalty_m),
            ("snap_radius_m", nav.snap_radius_m),
            ("turn_angle_deg", nav.turn_angle_deg),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(NavError::Config(format!("{} must be a finite number", name)));
            }
        }

        if nav.off_route_tolerance_m <= 0.0 {
            return Err(NavError::Config(
                "off_route_tolerance_m must be positive".to_string(),
            ));
        }
        if nav.arrival_tolerance_m <= 0.0 {
            return Err(NavError::Config(
                "arrival_tolerance_m must be positive".to_string(),
            ));
        }
        if nav.floor_transition_penalty_m < 0.0 || nav.reroute_suppression_secs < 0.0 {
            return Err(NavError::Config(
                "penalties and suppression windows cannot be negative".to_string(),
            ));
        }
        if nav.reroute_suppression_secs > MAX_REROUTE_SUPPRESSION_SECS {
            return Err(NavError::Config(format!(
                "reroute_suppression_secs cannot exceed {}",
                MAX_REROUTE_SUPPRESSION_SECS
            )));
        }
        Ok(())
    }
}

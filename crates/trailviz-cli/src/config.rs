//! Node configuration: defaults, JSON loading and topic naming.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use trailviz_core::{ConfigError, Geodetic, DEFAULT_TRAIL_SIZE};

pub const DEFAULT_NAMESPACE: &str = "px4_1";
pub const DEFAULT_TIMER_PERIOD_S: f64 = 0.05;

/// Gazebo world origin of the reference deployment.
pub const DEFAULT_REFERENCE: Geodetic = Geodetic::new(24.484043629238872, 54.36068616768677, 0.0);

pub const DEFAULT_WAYPOINTS: [Geodetic; 7] = [
    Geodetic::new(24.484326113268185, 54.360644616972564, 30.0),
    Geodetic::new(24.48476311664666, 54.3614948536716, 30.0),
    Geodetic::new(24.485097533474377, 54.36197496905472, 30.0),
    Geodetic::new(24.485400216562002, 54.3625570084458, 30.0),
    Geodetic::new(24.48585179883862, 54.36321951405934, 30.0),
    Geodetic::new(24.486198417650844, 54.363726451568475, 30.0),
    Geodetic::new(24.486564563238797, 54.36423338904003, 0.0),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Topic prefix. Routing only.
    pub namespace: String,
    pub reference: Geodetic,
    pub waypoints: Vec<Geodetic>,
    pub trail_size: usize,
    pub timer_period_s: f64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            reference: DEFAULT_REFERENCE,
            waypoints: DEFAULT_WAYPOINTS.to_vec(),
            trail_size: DEFAULT_TRAIL_SIZE,
            timer_period_s: DEFAULT_TIMER_PERIOD_S,
        }
    }
}

impl NodeConfig {
    /// Reads a JSON file; missing keys fall back to the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trail_size == 0 {
            return Err(ConfigError::ZeroTrailSize);
        }
        self.timer_period()?;
        Ok(())
    }

    /// Tick period. Rejects values that are not representable as a
    /// `Duration` or that round down to zero.
    pub fn timer_period(&self) -> Result<Duration, ConfigError> {
        match Duration::try_from_secs_f64(self.timer_period_s) {
            Ok(period) if !period.is_zero() => Ok(period),
            _ => Err(ConfigError::InvalidPeriod(self.timer_period_s)),
        }
    }

    pub fn topics(&self) -> Topics {
        Topics::new(&self.namespace)
    }
}

/// Topic names under a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topics {
    pub attitude: String,
    pub local_position: String,
    pub transform: String,
    pub waypoint_path: String,
    pub trail_path: String,
}

impl Topics {
    pub fn new(namespace: &str) -> Self {
        let ns = namespace.trim_end_matches('/');
        Self {
            attitude: format!("{ns}/fmu/out/vehicle_attitude"),
            local_position: format!("{ns}/fmu/out/vehicle_local_position"),
            transform: "tf".to_string(),
            waypoint_path: format!("{ns}/px4_visualizer/setpoint_path"),
            trail_path: format!("{ns}/px4_visualizer/vehicle_path"),
        }
    }
}

//! # Trailviz Core
//!
//! Pose republishing pipeline for vehicle visualization. This crate holds only
//! the synchronous, transport-free pieces:
//! - NED -> ENU frame conversion
//! - Latest-known telemetry state
//! - Bounded trail history
//! - Geodetic waypoint projection
//! - The fixed-period publish cycle
//!
//! Transport, timers and configuration loading live in `trailviz-cli`.

pub mod error;
pub mod frame;
pub mod geodetic;
pub mod publish;
pub mod telemetry;
pub mod trail;
pub mod waypoints;

// Re-export core types
pub use error::{ConfigError, MalformedTelemetry, ProjectionError, PublishError, StartupError};
pub use frame::{
    convert_attitude, convert_position, convert_velocity, Attitude, Enu, EnuAttitude, EnuVector,
    Frame, FrameVector, Ned, NedAttitude, NedVector,
};
pub use geodetic::{Geodetic, GeodeticProjector, Wgs84Projector};
pub use publish::{
    ArtifactKind, CycleState, Orientation, Path, Point, Pose, PoseStamped, PublishCycle,
    Publisher, Stamp, TickReport, TransformStamped, CHILD_FRAME, WORLD_FRAME,
};
pub use telemetry::{
    AttitudeEvent, PositionVelocityEvent, TelemetryEvent, TelemetryRecord, TelemetryState,
};
pub use trail::{TrailBuffer, DEFAULT_TRAIL_SIZE};
pub use waypoints::WaypointSet;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

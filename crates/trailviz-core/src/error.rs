use thiserror::Error;

use crate::publish::ArtifactKind;

/// Invalid node configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("trail size must be at least 1")]
    ZeroTrailSize,
    #[error("timer period must be a positive number of seconds between 1 ns and the Duration maximum, got {0}")]
    InvalidPeriod(f64),
}

/// The geodetic projector could not place a point.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("reference point is invalid: {0}")]
    InvalidReference(&'static str),
    #[error("waypoint {index} is invalid: {reason}")]
    InvalidWaypoint { index: usize, reason: &'static str },
}

/// Fatal errors raised while building the node. Nothing is published when one
/// of these occurs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StartupError {
    #[error("waypoint projection failed: {0}")]
    Projection(#[from] ProjectionError),
    #[error("projector returned {actual} offsets for {expected} waypoints")]
    LengthMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A telemetry record whose shape cannot be converted. Dropped, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedTelemetry {
    #[error("{field}: expected {expected} components, got {actual}")]
    WrongArity {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// A publishing boundary refused an artifact.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("{artifact} sink rejected the artifact: {reason}")]
    Rejected {
        artifact: ArtifactKind,
        reason: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

//! Static waypoint path, projected once at startup.

use crate::error::StartupError;
use crate::frame::{convert_position, EnuVector};
use crate::geodetic::{Geodetic, GeodeticProjector};

/// World-frame waypoints, fixed at startup.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WaypointSet {
    points: Vec<EnuVector>,
}

impl WaypointSet {
    /// Runs the projector once and converts every offset into the world frame.
    /// Any projector failure, or an output of the wrong length, is fatal.
    pub fn build<P: GeodeticProjector + ?Sized>(
        projector: &P,
        reference: &Geodetic,
        waypoints: &[Geodetic],
    ) -> Result<Self, StartupError> {
        let offsets = projector.project(reference, waypoints)?;
        if offsets.len() != waypoints.len() {
            return Err(StartupError::LengthMismatch {
                expected: waypoints.len(),
                actual: offsets.len(),
            });
        }

        Ok(Self {
            points: offsets.into_iter().map(convert_position).collect(),
        })
    }

    pub fn from_world(points: Vec<EnuVector>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn as_slice(&self) -> &[EnuVector] {
        &self.points
    }
}

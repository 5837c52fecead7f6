//! Inbound telemetry and the latest-known vehicle state.

use serde::{Deserialize, Serialize};

use crate::error::MalformedTelemetry;
use crate::frame::{
    convert_attitude, convert_position, convert_velocity, EnuAttitude, EnuVector, NedAttitude,
    NedVector,
};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttitudeEvent {
    pub q: NedAttitude,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionVelocityEvent {
    pub position: NedVector,
    pub velocity: NedVector,
}

/// A validated telemetry update in the vehicle's navigation frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryEvent {
    Attitude(AttitudeEvent),
    PositionVelocity(PositionVelocityEvent),
}

/// Untrusted telemetry as it arrives on the wire. Arity is only checked when
/// converting into a [`TelemetryEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryRecord {
    /// Quaternion in `[w, x, y, z]` order.
    Attitude { q: Vec<f64> },
    LocalPosition {
        position: Vec<f64>,
        velocity: Vec<f64>,
    },
}

fn components<const N: usize>(
    field: &'static str,
    values: &[f64],
) -> Result<[f64; N], MalformedTelemetry> {
    values
        .try_into()
        .map_err(|_| MalformedTelemetry::WrongArity {
            field,
            expected: N,
            actual: values.len(),
        })
}

impl TryFrom<TelemetryRecord> for TelemetryEvent {
    type Error = MalformedTelemetry;

    fn try_from(record: TelemetryRecord) -> Result<Self, Self::Error> {
        match record {
            TelemetryRecord::Attitude { q } => {
                let [w, x, y, z] = components::<4>("q", &q)?;
                Ok(Self::Attitude(AttitudeEvent {
                    q: NedAttitude::new(w, x, y, z),
                }))
            }
            TelemetryRecord::LocalPosition { position, velocity } => {
                let [x, y, z] = components::<3>("position", &position)?;
                let [vx, vy, vz] = components::<3>("velocity", &velocity)?;
                Ok(Self::PositionVelocity(PositionVelocityEvent {
                    position: NedVector::new(x, y, z),
                    velocity: NedVector::new(vx, vy, vz),
                }))
            }
        }
    }
}

impl From<TelemetryEvent> for TelemetryRecord {
    fn from(event: TelemetryEvent) -> Self {
        match event {
            TelemetryEvent::Attitude(a) => Self::Attitude {
                q: a.q.to_array().to_vec(),
            },
            TelemetryEvent::PositionVelocity(pv) => Self::LocalPosition {
                position: pv.position.to_array().to_vec(),
                velocity: pv.velocity.to_array().to_vec(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Latest vehicle pose and velocity, already in the world frame. No history
/// is kept here; see [`crate::trail::TrailBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetryState {
    position: EnuVector,
    velocity: EnuVector,
    orientation: EnuAttitude,
}

impl TelemetryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_attitude(&mut self, q: NedAttitude) {
        self.orientation = convert_attitude(q);
    }

    pub fn on_position_velocity(&mut self, position: NedVector, velocity: NedVector) {
        self.position = convert_position(position);
        self.velocity = convert_velocity(velocity);
    }

    pub fn apply(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::Attitude(a) => self.on_attitude(a.q),
            TelemetryEvent::PositionVelocity(pv) => {
                self.on_position_velocity(pv.position, pv.velocity)
            }
        }
    }

    pub fn position(&self) -> EnuVector {
        self.position
    }

    pub fn velocity(&self) -> EnuVector {
        self.velocity
    }

    pub fn orientation(&self) -> EnuAttitude {
        self.orientation
    }
}

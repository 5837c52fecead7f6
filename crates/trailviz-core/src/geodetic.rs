//! Geodetic waypoints and their projection into local NED offsets.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::ProjectionError;
use crate::frame::NedVector;

type Scalar = f64;

// ---------------------------------------------------------------------------
// WGS-84
// ---------------------------------------------------------------------------
const WGS84_A: Scalar = 6_378_137.0;
const WGS84_F: Scalar = 1.0 / 298.257_223_563;
const WGS84_E2: Scalar = WGS84_F * (2.0 - WGS84_F);

/// Latitude/longitude in degrees, altitude in metres above the ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geodetic {
    #[serde(alias = "lat")]
    pub latitude_deg: Scalar,
    #[serde(alias = "lon")]
    pub longitude_deg: Scalar,
    #[serde(alias = "alt", default)]
    pub altitude_m: Scalar,
}

impl Geodetic {
    pub const fn new(latitude_deg: Scalar, longitude_deg: Scalar, altitude_m: Scalar) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            altitude_m,
        }
    }

    fn check(&self) -> Result<(), &'static str> {
        if !(self.latitude_deg.is_finite()
            && self.longitude_deg.is_finite()
            && self.altitude_m.is_finite())
        {
            return Err("non-finite coordinate");
        }
        if self.latitude_deg.abs() > 90.0 {
            return Err("latitude outside [-90, 90]");
        }
        Ok(())
    }

    fn to_ecef(self) -> Vector3<Scalar> {
        let lat = self.latitude_deg.to_radians();
        let lon = self.longitude_deg.to_radians();
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();
        let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        let h = self.altitude_m;

        Vector3::new(
            (n + h) * cos_lat * cos_lon,
            (n + h) * cos_lat * sin_lon,
            (n * (1.0 - WGS84_E2) + h) * sin_lat,
        )
    }

    /// Rotation taking ECEF deltas into this point's local NED frame.
    fn ecef_to_ned(self) -> Matrix3<Scalar> {
        let (sin_lat, cos_lat) = self.latitude_deg.to_radians().sin_cos();
        let (sin_lon, cos_lon) = self.longitude_deg.to_radians().sin_cos();

        Matrix3::new(
            -sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat,
            -sin_lon, cos_lon, 0.0,
            -cos_lat * cos_lon, -cos_lat * sin_lon, -sin_lat,
        )
    }
}

/// Places geodetic points relative to a reference, in the reference's NED
/// frame. Implementations must return one offset per input point, in order.
pub trait GeodeticProjector {
    fn project(
        &self,
        reference: &Geodetic,
        points: &[Geodetic],
    ) -> Result<Vec<NedVector>, ProjectionError>;
}

/// Ellipsoidal `lla -> ECEF -> NED` projection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Wgs84Projector;

impl GeodeticProjector for Wgs84Projector {
    fn project(
        &self,
        reference: &Geodetic,
        points: &[Geodetic],
    ) -> Result<Vec<NedVector>, ProjectionError> {
        reference.check().map_err(ProjectionError::InvalidReference)?;

        let origin = reference.to_ecef();
        let rotation = reference.ecef_to_ned();

        points
            .iter()
            .enumerate()
            .map(|(index, point)| {
                point
                    .check()
                    .map_err(|reason| ProjectionError::InvalidWaypoint { index, reason })?;
                Ok(NedVector::from_vector(rotation * (point.to_ecef() - origin)))
            })
            .collect()
    }
}

//! Outbound artifacts and the fixed-period publish cycle.
//!
//! Each tick builds three artifacts from the current [`TelemetryState`]:
//! the vehicle transform, the static waypoint path and the flown trail. They
//! are handed to a [`Publisher`] in that order. A failing publish is logged
//! and does not stop the remaining artifacts from going out.

use core::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, PublishError};
use crate::frame::{EnuAttitude, EnuVector};
use crate::telemetry::TelemetryState;
use crate::trail::TrailBuffer;
use crate::waypoints::WaypointSet;

pub const WORLD_FRAME: &str = "map";
pub const CHILD_FRAME: &str = "Estimated_Pose";

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// Wall-clock time since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Stamp {
    pub sec: u64,
    pub nanosec: u32,
}

impl Stamp {
    pub fn now() -> Self {
        // A clock set before 1970 is reported as the epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(Self::from)
            .unwrap_or_default()
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.nanosec as f64 * 1e-9
    }
}

impl From<Duration> for Stamp {
    fn from(d: Duration) -> Self {
        Self {
            sec: d.as_secs(),
            nanosec: d.subsec_nanos(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<EnuVector> for Point {
    fn from(v: EnuVector) -> Self {
        Self {
            x: v.x(),
            y: v.y(),
            z: v.z(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Orientation {
    pub const IDENTITY: Self = Self {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
}

impl Default for Orientation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<EnuAttitude> for Orientation {
    fn from(q: EnuAttitude) -> Self {
        Self {
            w: q.w(),
            x: q.x(),
            y: q.y(),
            z: q.z(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseStamped {
    pub frame_id: String,
    pub stamp: Stamp,
    pub pose: Pose,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStamped {
    pub parent_frame: String,
    pub child_frame: String,
    pub stamp: Stamp,
    pub translation: Point,
    pub rotation: Orientation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub frame_id: String,
    pub stamp: Stamp,
    pub poses: Vec<PoseStamped>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Transform,
    WaypointPath,
    TrailPath,
}

impl ArtifactKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Transform => "transform",
            Self::WaypointPath => "waypoint path",
            Self::TrailPath => "trail path",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Publishing boundary
// ---------------------------------------------------------------------------

/// Where the cycle's artifacts go. Calls must not block.
pub trait Publisher {
    fn publish_transform(&mut self, transform: &TransformStamped) -> Result<(), PublishError>;
    fn publish_waypoint_path(&mut self, path: &Path) -> Result<(), PublishError>;
    fn publish_trail_path(&mut self, path: &Path) -> Result<(), PublishError>;
}

impl<P: Publisher + ?Sized> Publisher for &mut P {
    fn publish_transform(&mut self, transform: &TransformStamped) -> Result<(), PublishError> {
        (**self).publish_transform(transform)
    }

    fn publish_waypoint_path(&mut self, path: &Path) -> Result<(), PublishError> {
        (**self).publish_waypoint_path(path)
    }

    fn publish_trail_path(&mut self, path: &Path) -> Result<(), PublishError> {
        (**self).publish_trail_path(path)
    }
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
    fn publish_transform(&mut self, transform: &TransformStamped) -> Result<(), PublishError> {
        (**self).publish_transform(transform)
    }

    fn publish_waypoint_path(&mut self, path: &Path) -> Result<(), PublishError> {
        (**self).publish_waypoint_path(path)
    }

    fn publish_trail_path(&mut self, path: &Path) -> Result<(), PublishError> {
        (**self).publish_trail_path(path)
    }
}

// ---------------------------------------------------------------------------
// Cycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Emitting,
}

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// 1-based tick counter.
    pub seq: u64,
    pub trail_len: usize,
    pub failed: Vec<ArtifactKind>,
}

impl TickReport {
    pub fn all_published(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct PublishCycle {
    waypoints: WaypointSet,
    trail: TrailBuffer<PoseStamped>,
    state: CycleState,
    ticks: u64,
}

impl PublishCycle {
    pub fn new(waypoints: WaypointSet, trail_size: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            waypoints,
            trail: TrailBuffer::new(trail_size)?,
            state: CycleState::Idle,
            ticks: 0,
        })
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn waypoints(&self) -> &WaypointSet {
        &self.waypoints
    }

    pub fn trail(&self) -> &TrailBuffer<PoseStamped> {
        &self.trail
    }

    pub fn current_pose(telemetry: &TelemetryState, stamp: Stamp) -> PoseStamped {
        PoseStamped {
            frame_id: WORLD_FRAME.to_string(),
            stamp,
            pose: Pose {
                position: telemetry.position().into(),
                orientation: telemetry.orientation().into(),
            },
        }
    }

    pub fn transform(pose: &PoseStamped, stamp: Stamp) -> TransformStamped {
        TransformStamped {
            parent_frame: WORLD_FRAME.to_string(),
            child_frame: CHILD_FRAME.to_string(),
            stamp,
            translation: pose.pose.position,
            rotation: pose.pose.orientation,
        }
    }

    /// Origin followed by every waypoint, all with identity orientation. Carries
    /// no timestamps, so every tick produces an identical path.
    pub fn waypoint_path(&self) -> Path {
        let marker = |position: Point| PoseStamped {
            frame_id: WORLD_FRAME.to_string(),
            stamp: Stamp::default(),
            pose: Pose {
                position,
                orientation: Orientation::IDENTITY,
            },
        };

        let poses = core::iter::once(Point::default())
            .chain(self.waypoints.as_slice().iter().copied().map(Point::from))
            .map(marker)
            .collect();

        Path {
            frame_id: WORLD_FRAME.to_string(),
            stamp: Stamp::default(),
            poses,
        }
    }

    pub fn trail_path(&self, stamp: Stamp) -> Path {
        Path {
            frame_id: WORLD_FRAME.to_string(),
            stamp,
            poses: self.trail.snapshot(),
        }
    }

    pub fn tick<P: Publisher + ?Sized>(
        &mut self,
        telemetry: &TelemetryState,
        now: Stamp,
        publisher: &mut P,
    ) -> TickReport {
        self.ticks += 1;

        let pose = Self::current_pose(telemetry, now);
        let transform = Self::transform(&pose, now);
        let waypoints = self.waypoint_path();
        self.trail.append(pose);
        let trail = self.trail_path(now);

        self.state = CycleState::Emitting;
        let mut failed = Vec::new();
        let results = [
            (ArtifactKind::Transform, publisher.publish_transform(&transform)),
            (ArtifactKind::WaypointPath, publisher.publish_waypoint_path(&waypoints)),
            (ArtifactKind::TrailPath, publisher.publish_trail_path(&trail)),
        ];
        for (kind, result) in results {
            if let Err(e) = result {
                warn!(tick = self.ticks, artifact = %kind, error = %e, "publish failed");
                failed.push(kind);
            }
        }
        self.state = CycleState::Idle;

        debug!(
            tick = self.ticks,
            trail_len = self.trail.len(),
            failed = failed.len(),
            "tick complete"
        );

        TickReport {
            seq: self.ticks,
            trail_len: self.trail.len(),
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{NedAttitude, NedVector};

    #[derive(Debug, Clone, PartialEq)]
    enum Emitted {
        Transform(TransformStamped),
        Waypoints(Path),
        Trail(Path),
    }

    #[derive(Default)]
    struct Recorder {
        emitted: Vec<Emitted>,
        fail_transform: bool,
    }

    impl Publisher for Recorder {
        fn publish_transform(&mut self, transform: &TransformStamped) -> Result<(), PublishError> {
            if self.fail_transform {
                return Err(PublishError::Rejected {
                    artifact: ArtifactKind::Transform,
                    reason: "broker down".into(),
                });
            }
            self.emitted.push(Emitted::Transform(transform.clone()));
            Ok(())
        }

        fn publish_waypoint_path(&mut self, path: &Path) -> Result<(), PublishError> {
            self.emitted.push(Emitted::Waypoints(path.clone()));
            Ok(())
        }

        fn publish_trail_path(&mut self, path: &Path) -> Result<(), PublishError> {
            self.emitted.push(Emitted::Trail(path.clone()));
            Ok(())
        }
    }

    fn stamp(sec: u64) -> Stamp {
        Stamp { sec, nanosec: 0 }
    }

    #[test]
    fn test_single_tick_scenario() {
        let mut telemetry = TelemetryState::new();
        telemetry.on_attitude(NedAttitude::new(1.0, 0.0, 0.0, 0.0));
        telemetry.on_position_velocity(NedVector::new(1.0, 2.0, 3.0), NedVector::zeros());

        let mut cycle = PublishCycle::new(WaypointSet::default(), 1000).unwrap();
        let mut out = Recorder::default();
        let report = cycle.tick(&telemetry, stamp(7), &mut out);

        assert_eq!(report.seq, 1);
        assert_eq!(report.trail_len, 1);
        assert!(report.all_published());
        assert_eq!(cycle.state(), CycleState::Idle);
        assert_eq!(out.emitted.len(), 3);

        let Emitted::Transform(t) = &out.emitted[0] else {
            panic!("transform must be emitted first");
        };
        assert_eq!(t.parent_frame, "map");
        assert_eq!(t.child_frame, "Estimated_Pose");
        assert_eq!(t.stamp, stamp(7));
        assert_eq!(t.translation, Point { x: 2.0, y: 1.0, z: -3.0 });
        assert_eq!(t.rotation, Orientation::IDENTITY);

        let Emitted::Waypoints(w) = &out.emitted[1] else {
            panic!("waypoint path must be emitted second");
        };
        assert_eq!(w.poses.len(), 1);
        assert_eq!(w.poses[0].pose, Pose::default());

        let Emitted::Trail(trail) = &out.emitted[2] else {
            panic!("trail path must be emitted last");
        };
        assert_eq!(trail.poses.len(), 1);
        assert_eq!(trail.poses[0].pose.position, t.translation);
        assert_eq!(trail.poses[0].pose.orientation, t.rotation);
    }

    #[test]
    fn test_waypoint_path_starts_at_origin() {
        let waypoints = WaypointSet::from_world(vec![
            EnuVector::new(5.0, 6.0, 7.0),
            EnuVector::new(-1.0, 0.0, 30.0),
        ]);
        let cycle = PublishCycle::new(waypoints, 10).unwrap();
        let path = cycle.waypoint_path();

        assert_eq!(path.frame_id, WORLD_FRAME);
        let positions: Vec<Point> = path.poses.iter().map(|p| p.pose.position).collect();
        assert_eq!(
            positions,
            vec![
                Point::default(),
                Point { x: 5.0, y: 6.0, z: 7.0 },
                Point { x: -1.0, y: 0.0, z: 30.0 },
            ]
        );
        assert!(path
            .poses
            .iter()
            .all(|p| p.pose.orientation == Orientation::IDENTITY));

        // Deterministic across ticks.
        assert_eq!(cycle.waypoint_path(), path);
    }

    #[test]
    fn test_trail_is_bounded_across_ticks() {
        let mut cycle = PublishCycle::new(WaypointSet::default(), 3).unwrap();
        let mut telemetry = TelemetryState::new();
        let mut out = Recorder::default();

        for i in 0..5 {
            telemetry.on_position_velocity(NedVector::new(i as f64, 0.0, 0.0), NedVector::zeros());
            cycle.tick(&telemetry, stamp(i), &mut out);
        }

        let last_trail = out
            .emitted
            .iter()
            .rev()
            .find_map(|e| match e {
                Emitted::Trail(p) => Some(p.clone()),
                _ => None,
            })
            .unwrap();
        // NED x maps to ENU y.
        let ys: Vec<f64> = last_trail.poses.iter().map(|p| p.pose.position.y).collect();
        assert_eq!(ys, vec![2.0, 3.0, 4.0]);
        assert_eq!(cycle.trail().len(), 3);
        assert_eq!(cycle.ticks(), 5);
    }

    #[test]
    fn test_failed_publish_does_not_block_others() {
        let mut cycle = PublishCycle::new(WaypointSet::default(), 10).unwrap();
        let mut out = Recorder {
            fail_transform: true,
            ..Default::default()
        };
        let report = cycle.tick(&TelemetryState::new(), stamp(1), &mut out);

        assert_eq!(report.failed, vec![ArtifactKind::Transform]);
        assert_eq!(out.emitted.len(), 2);
        assert!(matches!(out.emitted[0], Emitted::Waypoints(_)));
        assert!(matches!(out.emitted[1], Emitted::Trail(_)));
        // The trail still grows.
        assert_eq!(cycle.trail().len(), 1);
    }

    #[test]
    fn test_stamp_from_duration() {
        let s = Stamp::from(Duration::from_millis(1_500));
        assert_eq!(s, Stamp { sec: 1, nanosec: 500_000_000 });
        assert!((s.as_secs_f64() - 1.5).abs() < 1e-12);
    }
}

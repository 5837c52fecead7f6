//! Publishing sinks.

use std::io::Write;

use serde::Serialize;
use tracing::info;
use trailviz_core::{ArtifactKind, Path, PublishError, Publisher, TransformStamped};

use crate::config::Topics;

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// One log line per artifact.
#[derive(Debug, Clone)]
pub struct LogPublisher {
    topics: Topics,
}

impl LogPublisher {
    pub fn new(topics: Topics) -> Self {
        Self { topics }
    }
}

impl Publisher for LogPublisher {
    fn publish_transform(&mut self, t: &TransformStamped) -> Result<(), PublishError> {
        info!(
            topic = %self.topics.transform,
            "{} -> {} at ({:.2}, {:.2}, {:.2}) q=({:.3}, {:.3}, {:.3}, {:.3})",
            t.parent_frame,
            t.child_frame,
            t.translation.x,
            t.translation.y,
            t.translation.z,
            t.rotation.w,
            t.rotation.x,
            t.rotation.y,
            t.rotation.z,
        );
        Ok(())
    }

    fn publish_waypoint_path(&mut self, path: &Path) -> Result<(), PublishError> {
        info!(topic = %self.topics.waypoint_path, poses = path.poses.len(), "waypoint path");
        Ok(())
    }

    fn publish_trail_path(&mut self, path: &Path) -> Result<(), PublishError> {
        info!(topic = %self.topics.trail_path, poses = path.poses.len(), "trail path");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON lines
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Envelope<'a, T> {
    topic: &'a str,
    kind: ArtifactKind,
    message: &'a T,
}

/// Writes every artifact as a single JSON object followed by a newline.
pub struct JsonLinesPublisher<W: Write> {
    writer: W,
    topics: Topics,
}

impl<W: Write> JsonLinesPublisher<W> {
    pub fn new(writer: W, topics: Topics) -> Self {
        Self { writer, topics }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn write_line<W: Write, T: Serialize>(
    writer: &mut W,
    kind: ArtifactKind,
    topic: &str,
    message: &T,
) -> Result<(), PublishError> {
    let envelope = Envelope {
        topic,
        kind,
        message,
    };
    serde_json::to_writer(&mut *writer, &envelope).map_err(std::io::Error::from)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

impl<W: Write> Publisher for JsonLinesPublisher<W> {
    fn publish_transform(&mut self, t: &TransformStamped) -> Result<(), PublishError> {
        write_line(&mut self.writer, ArtifactKind::Transform, &self.topics.transform, t)
    }

    fn publish_waypoint_path(&mut self, path: &Path) -> Result<(), PublishError> {
        write_line(
            &mut self.writer,
            ArtifactKind::WaypointPath,
            &self.topics.waypoint_path,
            path,
        )
    }

    fn publish_trail_path(&mut self, path: &Path) -> Result<(), PublishError> {
        write_line(
            &mut self.writer,
            ArtifactKind::TrailPath,
            &self.topics.trail_path,
            path,
        )
    }
}

// ---------------------------------------------------------------------------
// Fan-out
// ---------------------------------------------------------------------------

/// Forwards each artifact to every child, even after one of them fails. The
/// first error is returned.
#[derive(Default)]
pub struct FanoutPublisher {
    children: Vec<Box<dyn Publisher + Send>>,
}

impl FanoutPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, child: impl Publisher + Send + 'static) -> Self {
        self.children.push(Box::new(child));
        self
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Drains every result so that all children are reached.
fn first_error(results: impl Iterator<Item = Result<(), PublishError>>) -> Result<(), PublishError> {
    results.fold(Ok(()), |acc, r| acc.and(r))
}

impl Publisher for FanoutPublisher {
    fn publish_transform(&mut self, t: &TransformStamped) -> Result<(), PublishError> {
        first_error(self.children.iter_mut().map(|p| p.publish_transform(t)))
    }

    fn publish_waypoint_path(&mut self, path: &Path) -> Result<(), PublishError> {
        first_error(self.children.iter_mut().map(|p| p.publish_waypoint_path(path)))
    }

    fn publish_trail_path(&mut self, path: &Path) -> Result<(), PublishError> {
        first_error(self.children.iter_mut().map(|p| p.publish_trail_path(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use trailviz_core::{Orientation, Point, Stamp};

    fn sample_transform() -> TransformStamped {
        TransformStamped {
            parent_frame: "map".into(),
            child_frame: "Estimated_Pose".into(),
            stamp: Stamp { sec: 3, nanosec: 0 },
            translation: Point {
                x: 2.0,
                y: 1.0,
                z: -3.0,
            },
            rotation: Orientation::IDENTITY,
        }
    }

    #[test]
    fn test_json_lines_envelope() {
        let mut sink = JsonLinesPublisher::new(Vec::new(), Topics::new("px4_1"));
        sink.publish_transform(&sample_transform()).unwrap();
        sink.publish_trail_path(&Path {
            frame_id: "map".into(),
            stamp: Stamp::default(),
            poses: vec![],
        })
        .unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["topic"], "tf");
        assert_eq!(lines[0]["kind"], "transform");
        assert_eq!(lines[0]["message"]["translation"]["z"], -3.0);
        assert_eq!(lines[1]["topic"], "px4_1/px4_visualizer/vehicle_path");
        assert_eq!(lines[1]["kind"], "trail_path");
    }

    struct Failing;

    impl Publisher for Failing {
        fn publish_transform(&mut self, _: &TransformStamped) -> Result<(), PublishError> {
            Err(PublishError::Rejected {
                artifact: ArtifactKind::Transform,
                reason: "closed".into(),
            })
        }
        fn publish_waypoint_path(&mut self, _: &Path) -> Result<(), PublishError> {
            Ok(())
        }
        fn publish_trail_path(&mut self, _: &Path) -> Result<(), PublishError> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Counter(Arc<Mutex<usize>>);

    impl Publisher for Counter {
        fn publish_transform(&mut self, _: &TransformStamped) -> Result<(), PublishError> {
            *self.0.lock().unwrap() += 1;
            Ok(())
        }
        fn publish_waypoint_path(&mut self, _: &Path) -> Result<(), PublishError> {
            Ok(())
        }
        fn publish_trail_path(&mut self, _: &Path) -> Result<(), PublishError> {
            Ok(())
        }
    }

    #[test]
    fn test_fanout_reaches_every_child() {
        let counter = Counter::default();
        let mut fanout = FanoutPublisher::new().with(Failing).with(counter.clone());
        assert_eq!(fanout.len(), 2);

        assert!(fanout.publish_transform(&sample_transform()).is_err());
        assert_eq!(*counter.0.lock().unwrap(), 1);
    }
}

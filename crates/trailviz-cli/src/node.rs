//! The node actor.
//!
//! A single task owns the telemetry state and the publish cycle. Telemetry
//! records arrive on an mpsc queue and the cycle runs on an interval; both are
//! handled on the same task, so ingest and tick never overlap.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use trailviz_core::{
    GeodeticProjector, PublishCycle, Publisher, Stamp, StartupError, TelemetryEvent,
    TelemetryRecord, TelemetryState, TickReport, WaypointSet,
};

use crate::config::NodeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeStats {
    pub ticks: u64,
    pub applied: u64,
    pub dropped: u64,
    pub failed_publishes: u64,
}

pub struct Node {
    telemetry: TelemetryState,
    cycle: PublishCycle,
    period: Duration,
    exit_on_close: bool,
    stats: NodeStats,
}

impl Node {
    pub fn new(cycle: PublishCycle, period: Duration) -> Self {
        Self {
            telemetry: TelemetryState::new(),
            cycle,
            period,
            exit_on_close: false,
            stats: NodeStats::default(),
        }
    }

    /// Validates the configuration and projects the waypoints. Nothing is
    /// published if this fails.
    pub fn from_config<P: GeodeticProjector + ?Sized>(
        config: &NodeConfig,
        projector: &P,
    ) -> Result<Self, StartupError> {
        config.validate()?;
        let period = config.timer_period()?;
        let waypoints = WaypointSet::build(projector, &config.reference, &config.waypoints)?;
        let cycle = PublishCycle::new(waypoints, config.trail_size)?;
        Ok(Self::new(cycle, period))
    }

    /// Stop as soon as every telemetry sender is gone.
    pub fn exit_on_close(mut self, exit: bool) -> Self {
        self.exit_on_close = exit;
        self
    }

    pub fn telemetry(&self) -> &TelemetryState {
        &self.telemetry
    }

    pub fn cycle(&self) -> &PublishCycle {
        &self.cycle
    }

    pub fn stats(&self) -> NodeStats {
        self.stats
    }

    /// Applies a record, or drops it with a warning if it is malformed.
    pub fn handle_record(&mut self, record: TelemetryRecord) -> bool {
        match TelemetryEvent::try_from(record) {
            Ok(event) => {
                self.telemetry.apply(&event);
                self.stats.applied += 1;
                true
            }
            Err(e) => {
                warn!(error = %e, "dropping malformed telemetry");
                self.stats.dropped += 1;
                false
            }
        }
    }

    pub fn tick<P: Publisher + ?Sized>(&mut self, publisher: &mut P) -> TickReport {
        let report = self.cycle.tick(&self.telemetry, Stamp::now(), publisher);
        self.stats.ticks += 1;
        self.stats.failed_publishes += report.failed.len() as u64;
        report
    }

    /// Runs until `shutdown` resolves, or until the queue closes when
    /// [`Node::exit_on_close`] is set. The first tick fires one period after
    /// start.
    pub async fn run<P, S>(
        mut self,
        mut rx: mpsc::Receiver<TelemetryRecord>,
        mut publisher: P,
        shutdown: S,
    ) -> NodeStats
    where
        P: Publisher,
        S: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut queue_open = true;
        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick(&mut publisher);
                }
                record = rx.recv(), if queue_open => match record {
                    Some(record) => {
                        self.handle_record(record);
                    }
                    None => {
                        queue_open = false;
                        debug!("telemetry queue closed");
                        if self.exit_on_close {
                            break;
                        }
                    }
                },
            }
        }

        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trailviz_core::{ConfigError, Geodetic, Wgs84Projector};

    fn node(trail_size: usize) -> Node {
        let config = NodeConfig {
            waypoints: vec![],
            trail_size,
            ..Default::default()
        };
        Node::from_config(&config, &Wgs84Projector).unwrap()
    }

    #[test]
    fn test_from_config_projects_waypoints() {
        let node = Node::from_config(&NodeConfig::default(), &Wgs84Projector).unwrap();
        assert_eq!(node.cycle().waypoints().len(), 7);
        // First default waypoint: ~31 m north, ~4 m west, 30 m up.
        let first = node.cycle().waypoints().as_slice()[0];
        assert!((first.x() + 4.21).abs() < 0.01);
        assert!((first.y() - 31.29).abs() < 0.01);
        assert!((first.z() - 30.0).abs() < 0.01);
    }

    #[test]
    fn test_from_config_rejects_bad_config() {
        let config = NodeConfig {
            trail_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            Node::from_config(&config, &Wgs84Projector),
            Err(StartupError::Config(_))
        ));

        for period in [1e-10, 1e20] {
            let config = NodeConfig {
                timer_period_s: period,
                ..Default::default()
            };
            assert!(matches!(
                Node::from_config(&config, &Wgs84Projector),
                Err(StartupError::Config(ConfigError::InvalidPeriod(_)))
            ));
        }

        let config = NodeConfig {
            waypoints: vec![Geodetic::new(95.0, 0.0, 0.0)],
            ..Default::default()
        };
        assert!(matches!(
            Node::from_config(&config, &Wgs84Projector),
            Err(StartupError::Projection(_))
        ));
    }

    #[test]
    fn test_malformed_record_is_dropped() {
        let mut node = node(10);
        node.handle_record(TelemetryRecord::LocalPosition {
            position: vec![1.0, 2.0, 3.0],
            velocity: vec![0.0; 3],
        });
        let before = *node.telemetry();

        assert!(!node.handle_record(TelemetryRecord::Attitude { q: vec![1.0, 0.0] }));
        assert_eq!(*node.telemetry(), before);
        assert_eq!(
            node.stats(),
            NodeStats {
                applied: 1,
                dropped: 1,
                ..Default::default()
            }
        );
    }
}

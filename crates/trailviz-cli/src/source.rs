//! Telemetry sources feeding the node's queue.

use std::f64::consts::FRAC_PI_2;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, ensure, Context, Result};
use nalgebra::{UnitQuaternion, Vector3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use trailviz_core::TelemetryRecord;

pub type TelemetryTx = mpsc::Sender<TelemetryRecord>;

#[derive(Debug, Clone)]
pub enum SourceSpec {
    /// JSON-lines records; `None` reads stdin.
    Replay { input: Option<PathBuf> },
    Synthetic(SyntheticFlight),
}

/// Runs the source on its own task. Dropping the sender on return is how the
/// node learns the source is exhausted.
pub fn spawn(spec: SourceSpec, tx: TelemetryTx) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        match spec {
            SourceSpec::Replay { input } => {
                let sent = replay_path(input.as_deref(), &tx).await?;
                info!(records = sent, "telemetry replay finished");
                Ok(())
            }
            SourceSpec::Synthetic(flight) => flight.run(tx).await,
        }
    })
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

pub async fn replay_path(input: Option<&Path>, tx: &TelemetryTx) -> Result<usize> {
    match input {
        None => replay(BufReader::new(tokio::io::stdin()), tx).await,
        Some(path) if path.as_os_str() == "-" => {
            replay(BufReader::new(tokio::io::stdin()), tx).await
        }
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening telemetry {}", path.display()))?;
            replay(BufReader::new(file), tx).await
        }
    }
}

/// Forwards every parsable line. Lines that are not a telemetry record are
/// skipped with a warning. Returns the number of records sent.
pub async fn replay<R: AsyncBufRead + Unpin>(reader: R, tx: &TelemetryTx) -> Result<usize> {
    let mut lines = reader.lines();
    let mut line_no = 0usize;
    let mut sent = 0usize;

    while let Some(line) = lines.next_line().await.context("reading telemetry")? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<TelemetryRecord>(line) {
            Ok(record) => {
                if tx.send(record).await.is_err() {
                    debug!("node queue closed, stopping replay");
                    break;
                }
                sent += 1;
            }
            Err(e) => warn!(line = line_no, error = %e, "skipping unparsable telemetry"),
        }
    }

    Ok(sent)
}

// ---------------------------------------------------------------------------
// Synthetic flight
// ---------------------------------------------------------------------------

/// Vehicle orbiting the NED origin at constant altitude and ground speed.
#[derive(Debug, Clone)]
pub struct SyntheticFlight {
    pub radius_m: f64,
    pub altitude_m: f64,
    pub speed_mps: f64,
    pub rate_hz: f64,
    /// Standard deviation of the position noise.
    pub noise_std_m: f64,
    pub seed: u64,
}

impl Default for SyntheticFlight {
    fn default() -> Self {
        Self {
            radius_m: 40.0,
            altitude_m: 30.0,
            speed_mps: 5.0,
            rate_hz: 50.0,
            noise_std_m: 0.0,
            seed: 42,
        }
    }
}

impl SyntheticFlight {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.radius_m.is_finite() && self.radius_m > 0.0,
            "orbit radius must be positive"
        );
        ensure!(self.altitude_m.is_finite(), "altitude must be finite");
        ensure!(self.speed_mps.is_finite(), "speed must be finite");
        self.sample_period()?;
        ensure!(
            self.noise_std_m.is_finite() && self.noise_std_m >= 0.0,
            "noise must be a non-negative standard deviation"
        );
        Ok(())
    }

    /// Interval between samples. The rate must be positive and slow enough
    /// for the interval to stay non-zero.
    pub fn sample_period(&self) -> Result<Duration> {
        ensure!(
            self.rate_hz.is_finite() && self.rate_hz > 0.0,
            "telemetry rate must be positive"
        );
        let period = Duration::try_from_secs_f64(1.0 / self.rate_hz)
            .context("telemetry rate out of range")?;
        ensure!(
            !period.is_zero(),
            "telemetry rate {} Hz is too high",
            self.rate_hz
        );
        Ok(period)
    }

    /// Position and velocity (NED) at time `t`.
    pub fn kinematics(&self, t: f64) -> (Vector3<f64>, Vector3<f64>) {
        let omega = self.speed_mps / self.radius_m;
        let (s, c) = (omega * t).sin_cos();
        let position = Vector3::new(self.radius_m * c, self.radius_m * s, -self.altitude_m);
        let velocity = Vector3::new(-self.speed_mps * s, self.speed_mps * c, 0.0);
        (position, velocity)
    }

    /// Noise-free attitude and local position records at time `t`. The vehicle
    /// is level and heads along its velocity.
    pub fn sample(&self, t: f64) -> [TelemetryRecord; 2] {
        let (position, velocity) = self.kinematics(t);
        let yaw = if velocity.xy().norm() > 0.0 {
            velocity.y.atan2(velocity.x)
        } else {
            // Stationary on the orbit: face tangentially.
            (self.speed_mps / self.radius_m * t) + FRAC_PI_2
        };
        let q = UnitQuaternion::from_euler_angles(0.0, 0.0, yaw);

        [
            TelemetryRecord::Attitude {
                q: vec![q.w, q.i, q.j, q.k],
            },
            TelemetryRecord::LocalPosition {
                position: position.as_slice().to_vec(),
                velocity: velocity.as_slice().to_vec(),
            },
        ]
    }

    pub async fn run(self, tx: TelemetryTx) -> Result<()> {
        self.validate()?;
        let period = self.sample_period()?;
        let noise = Normal::new(0.0, self.noise_std_m)
            .map_err(|e| anyhow!("invalid position noise: {e}"))?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut ticker = tokio::time::interval(period);

        info!(
            radius_m = self.radius_m,
            altitude_m = self.altitude_m,
            speed_mps = self.speed_mps,
            rate_hz = self.rate_hz,
            "synthetic telemetry started"
        );

        for step in 0u64.. {
            ticker.tick().await;
            let t = step as f64 / self.rate_hz;
            let [attitude, mut local] = self.sample(t);
            if self.noise_std_m > 0.0 {
                if let TelemetryRecord::LocalPosition { position, .. } = &mut local {
                    for axis in position.iter_mut() {
                        *axis += noise.sample(&mut rng);
                    }
                }
            }
            if tx.send(attitude).await.is_err() || tx.send(local).await.is_err() {
                debug!("node queue closed, stopping synthetic telemetry");
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_at_start_of_orbit() {
        let flight = SyntheticFlight::default();
        let [attitude, local] = flight.sample(0.0);

        let TelemetryRecord::LocalPosition { position, velocity } = local else {
            panic!("expected local position");
        };
        assert_eq!(position, vec![40.0, 0.0, -30.0]);
        assert!((velocity[0]).abs() < 1e-12);
        assert!((velocity[1] - 5.0).abs() < 1e-12);

        // Heading east: 90 degree yaw about the down axis.
        let TelemetryRecord::Attitude { q } = attitude else {
            panic!("expected attitude");
        };
        let half = std::f64::consts::FRAC_1_SQRT_2;
        assert!((q[0] - half).abs() < 1e-9);
        assert!(q[1].abs() < 1e-9);
        assert!(q[2].abs() < 1e-9);
        assert!((q[3] - half).abs() < 1e-9);
    }

    #[test]
    fn test_orbit_keeps_radius() {
        let flight = SyntheticFlight::default();
        for i in 0..20 {
            let (p, v) = flight.kinematics(i as f64 * 1.7);
            assert!((p.xy().norm() - flight.radius_m).abs() < 1e-9);
            assert!((v.norm() - flight.speed_mps).abs() < 1e-9);
            assert_eq!(p.z, -flight.altitude_m);
        }
    }

    #[test]
    fn test_validate() {
        assert!(SyntheticFlight::default().validate().is_ok());
        let flight = SyntheticFlight {
            radius_m: 0.0,
            ..Default::default()
        };
        assert!(flight.validate().is_err());
        let flight = SyntheticFlight {
            noise_std_m: -1.0,
            ..Default::default()
        };
        assert!(flight.validate().is_err());
    }

    #[test]
    fn test_rate_must_give_nonzero_interval() {
        let flight = SyntheticFlight::default();
        assert_eq!(flight.sample_period().unwrap(), Duration::from_millis(20));

        let flight = SyntheticFlight {
            rate_hz: 1e10,
            ..Default::default()
        };
        assert!(flight.sample_period().is_err());
        assert!(flight.validate().is_err());

        let flight = SyntheticFlight {
            rate_hz: 0.0,
            ..Default::default()
        };
        assert!(flight.validate().is_err());
    }

    #[tokio::test]
    async fn test_run_rejects_rate_too_high() {
        let (tx, mut rx) = mpsc::channel(4);
        let flight = SyntheticFlight {
            rate_hz: 1e10,
            ..Default::default()
        };
        assert!(flight.run(tx).await.is_err());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_replay_skips_bad_lines() {
        let input = concat!(
            "{\"type\":\"attitude\",\"q\":[1,0,0,0]}\n",
            "\n",
            "not json\n",
            "{\"type\":\"local_position\",\"position\":[1,2],\"velocity\":[0,0,0]}\n",
        );
        let (tx, mut rx) = mpsc::channel(8);
        let sent = replay(input.as_bytes(), &tx).await.unwrap();
        drop(tx);

        // Wrong arity still parses; the node is what rejects it.
        assert_eq!(sent, 2);
        let mut received = Vec::new();
        while let Some(r) = rx.recv().await {
            received.push(r);
        }
        assert_eq!(
            received[0],
            TelemetryRecord::Attitude {
                q: vec![1.0, 0.0, 0.0, 0.0]
            }
        );
        assert!(matches!(received[1], TelemetryRecord::LocalPosition { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthetic_stops_when_queue_closes() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = tokio::spawn(SyntheticFlight::default().run(tx));
        for _ in 0..6 {
            assert!(rx.recv().await.is_some());
        }
        drop(rx);
        assert!(handle.await.unwrap().is_ok());
    }
}

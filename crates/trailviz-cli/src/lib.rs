//! Trailviz CLI - runs the pose republishing node from the command line.

pub mod config;
pub mod node;
pub mod sink;
pub mod source;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tracing::{info, warn};
use trailviz_core::{Publisher, Wgs84Projector};

pub use config::{NodeConfig, Topics};
pub use node::{Node, NodeStats};
pub use sink::{FanoutPublisher, JsonLinesPublisher, LogPublisher};
pub use source::{SourceSpec, SyntheticFlight};

/// Bounded so a stalled node applies backpressure to its sources.
const TELEMETRY_QUEUE_DEPTH: usize = 1024;

/// Public function that can be called from the main binary
pub fn run_cli_main(args: &[&str]) -> Result<()> {
    let args = Args::parse_from(args);
    main_inner(args)
}

#[derive(Parser, Debug, Clone)]
#[command(name = "trailviz-cli")]
#[command(about = "Republish vehicle telemetry as world-frame pose, trail and waypoint path")]
#[command(version)]
pub struct Args {
    /// JSON node configuration. Flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    namespace: Option<String>,

    #[arg(long)]
    trail_size: Option<usize>,

    /// Tick period (s)
    #[arg(long)]
    period: Option<f64>,

    // ── Telemetry source ──────────────────────────────────────
    #[arg(long, value_enum, default_value = "synthetic")]
    source: SourceKind,

    /// JSON-lines telemetry for `--source replay` ("-" reads stdin)
    #[arg(short, long, default_value = "-")]
    input: PathBuf,

    #[arg(long, default_value_t = 40.0)]
    radius: f64,

    #[arg(long, default_value_t = 30.0)]
    altitude: f64,

    #[arg(long, default_value_t = 5.0)]
    speed: f64,

    /// Synthetic telemetry rate (Hz)
    #[arg(long, default_value_t = 50.0)]
    rate: f64,

    /// Position noise std dev (m)
    #[arg(long, default_value_t = 0.0)]
    noise: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    // ── Output ────────────────────────────────────────────────
    #[arg(long, value_enum, default_value = "log")]
    sink: SinkKind,

    /// Destination for `--sink jsonl` ("-" writes stdout)
    #[arg(short, long, default_value = "-")]
    output: PathBuf,

    // ── Lifetime ──────────────────────────────────────────────
    /// Stop once the telemetry source is exhausted
    #[arg(long)]
    exit_on_eof: bool,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    Replay,
    Synthetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    Log,
    Jsonl,
    None,
}

impl Args {
    /// Config file (or defaults) with command-line overrides applied.
    pub fn node_config(&self) -> Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_file(path)?,
            None => NodeConfig::default(),
        };
        if let Some(ns) = &self.namespace {
            config.namespace = ns.clone();
        }
        if let Some(size) = self.trail_size {
            config.trail_size = size;
        }
        if let Some(period) = self.period {
            config.timer_period_s = period;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn source_spec(&self) -> Result<SourceSpec> {
        Ok(match self.source {
            SourceKind::Replay => SourceSpec::Replay {
                input: (self.input.as_os_str() != "-").then(|| self.input.clone()),
            },
            SourceKind::Synthetic => {
                let flight = SyntheticFlight {
                    radius_m: self.radius,
                    altitude_m: self.altitude,
                    speed_mps: self.speed,
                    rate_hz: self.rate,
                    noise_std_m: self.noise,
                    seed: self.seed,
                };
                flight.validate()?;
                SourceSpec::Synthetic(flight)
            }
        })
    }

    pub fn run_limit(&self) -> Result<Option<Duration>> {
        match self.duration {
            None => Ok(None),
            Some(secs) if secs.is_finite() && secs > 0.0 => Ok(Some(Duration::from_secs_f64(secs))),
            Some(secs) => bail!("--duration must be a positive number of seconds, got {secs}"),
        }
    }

    /// Publisher selected by `--sink`.
    pub fn build_publisher(&self, topics: &Topics) -> Result<FanoutPublisher> {
        let fanout = FanoutPublisher::new();
        Ok(match self.sink {
            SinkKind::Log => fanout.with(LogPublisher::new(topics.clone())),
            SinkKind::Jsonl => {
                let writer: Box<dyn Write + Send> = if self.output.as_os_str() == "-" {
                    Box::new(std::io::stdout())
                } else {
                    let file = File::create(&self.output)
                        .with_context(|| format!("creating {}", self.output.display()))?;
                    Box::new(BufWriter::new(file))
                };
                fanout.with(JsonLinesPublisher::new(writer, topics.clone()))
            }
            SinkKind::None => fanout,
        })
    }
}

fn main_inner(args: Args) -> Result<()> {
    let config = args.node_config()?;
    let node = build_node(&args, &config)?;
    // Only opened once startup has succeeded.
    let publisher = args.build_publisher(&config.topics())?;

    let rt = tokio::runtime::Runtime::new()?;
    let stats = rt.block_on(run_node(&args, node, publisher))?;
    info!(
        ticks = stats.ticks,
        applied = stats.applied,
        dropped = stats.dropped,
        failed_publishes = stats.failed_publishes,
        "node stopped"
    );
    Ok(())
}

/// Validates the source and lifetime flags and builds the node from `config`.
/// Nothing is opened or published if this fails.
pub fn build_node(args: &Args, config: &NodeConfig) -> Result<Node> {
    args.source_spec()?;
    args.run_limit()?;
    let node = Node::from_config(config, &Wgs84Projector)
        .context("node startup failed")?
        .exit_on_close(args.exit_on_eof);

    let topics = config.topics();
    info!(
        namespace = %config.namespace,
        waypoints = node.cycle().waypoints().len(),
        trail_size = config.trail_size,
        period_s = config.timer_period_s,
        "node started"
    );
    info!(attitude = %topics.attitude, local_position = %topics.local_position, "telemetry topics");
    Ok(node)
}

/// Starts the telemetry source and runs `node` until Ctrl-C, `--duration` or
/// (with `--exit-on-eof`) the end of telemetry.
pub async fn run_node<P: Publisher>(args: &Args, node: Node, publisher: P) -> Result<NodeStats> {
    let spec = args.source_spec()?;
    let limit = args.run_limit()?;

    let (tx, rx) = mpsc::channel(TELEMETRY_QUEUE_DEPTH);
    let source = source::spawn(spec, tx);

    let stats = node.run(rx, publisher, shutdown_signal(limit)).await;

    if source.is_finished() {
        match source.await {
            Ok(Err(e)) => warn!(error = %e, "telemetry source failed"),
            Err(e) => warn!(error = %e, "telemetry source panicked"),
            Ok(Ok(())) => {}
        }
    } else {
        source.abort();
    }

    Ok(stats)
}

async fn shutdown_signal(limit: Option<Duration>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    match limit {
        Some(limit) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = tokio::time::sleep(limit) => {}
            }
        }
        None => ctrl_c.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse() {
        let args = Args::parse_from(["trailviz-cli"]);
        assert_eq!(args.source, SourceKind::Synthetic);
        assert_eq!(args.sink, SinkKind::Log);
        assert!(args.run_limit().unwrap().is_none());
        assert_eq!(args.node_config().unwrap(), NodeConfig::default());
    }

    #[test]
    fn test_overrides_apply() {
        let args = Args::parse_from([
            "trailviz-cli",
            "--namespace",
            "px4_3",
            "--trail-size",
            "12",
            "--period",
            "0.1",
            "--source",
            "replay",
            "--input",
            "flight.jsonl",
        ]);
        let config = args.node_config().unwrap();
        assert_eq!(config.namespace, "px4_3");
        assert_eq!(config.trail_size, 12);
        assert_eq!(config.timer_period_s, 0.1);
        match args.source_spec().unwrap() {
            SourceSpec::Replay { input } => assert_eq!(input, Some(PathBuf::from("flight.jsonl"))),
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn test_invalid_overrides_rejected() {
        let args = Args::parse_from(["trailviz-cli", "--trail-size", "0"]);
        assert!(args.node_config().is_err());

        let args = Args::parse_from(["trailviz-cli", "--period", "1e-10"]);
        assert!(args.node_config().is_err());

        let args = Args::parse_from(["trailviz-cli", "--rate", "1e10"]);
        assert!(args.source_spec().is_err());

        let args = Args::parse_from(["trailviz-cli", "--duration=-1"]);
        assert!(args.run_limit().is_err());

        let args = Args::parse_from(["trailviz-cli", "--radius", "0"]);
        assert!(args.source_spec().is_err());
    }

    #[test]
    fn test_failed_startup_leaves_output_untouched() {
        let dir = std::env::temp_dir().join(format!("trailviz-startup-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let output = dir.join("artifacts.jsonl");
        std::fs::write(&output, "previous run\n").unwrap();
        let config_path = dir.join("bad.json");
        std::fs::write(&config_path, r#"{"waypoints": [{"lat": 95.0, "lon": 0.0}]}"#).unwrap();

        let args = Args::parse_from([
            "trailviz-cli",
            "--config",
            config_path.to_str().unwrap(),
            "--sink",
            "jsonl",
            "--output",
            output.to_str().unwrap(),
        ]);
        assert!(main_inner(args).is_err());
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "previous run\n");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_sink_selection() {
        let topics = Topics::new("px4_1");
        let args = Args::parse_from(["trailviz-cli", "--sink", "none"]);
        assert!(args.build_publisher(&topics).unwrap().is_empty());
        let args = Args::parse_from(["trailviz-cli"]);
        assert_eq!(args.build_publisher(&topics).unwrap().len(), 1);
    }
}

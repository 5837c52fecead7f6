//! Trailviz - vehicle pose, trail and waypoint republisher

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "trailviz")]
#[command(about = "Republish vehicle telemetry as world-frame pose, trail and waypoint path")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node with log or JSON-lines output
    Cli {
        /// Pass remaining arguments to trailviz-cli
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run the node and serve its artifacts over HTTP
    Gui {
        /// Port to bind to
        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        /// Host to bind to
        #[arg(short = 'H', long, default_value = "0.0.0.0")]
        host: String,

        /// Node arguments, as accepted by `trailviz cli`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `--sink jsonl` can own stdout.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Cli { args }) => run_cli(&args),
        Some(Commands::Gui { port, host, args }) => run_gui(port, &host, &args),
        None => run_gui(8080, "0.0.0.0", &[]),
    }
}

fn node_args(args: &[String]) -> Vec<&str> {
    let mut full_args = vec!["trailviz-cli"];
    full_args.extend(args.iter().map(String::as_str));
    full_args
}

fn run_cli(args: &[String]) -> anyhow::Result<()> {
    match trailviz_cli::run_cli_main(&node_args(args)) {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("CLI error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run_gui(port: u16, host: &str, args: &[String]) -> anyhow::Result<()> {
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tokio::runtime::Runtime;
    use trailviz_gui::SharedPublisher;

    let args = trailviz_cli::Args::parse_from(node_args(args));
    let config = args.node_config()?;
    let node = trailviz_cli::build_node(&args, &config)?;
    let shared = SharedPublisher::new();
    let artifacts = shared.artifacts();
    let publisher = args.build_publisher(&config.topics())?.with(shared);

    let rt = Runtime::new()?;
    rt.block_on(async {
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {host}:{port}"))?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        println!("listening on http://{}", addr);
        info!(%addr, "viewer started");

        tokio::select! {
            stats = trailviz_cli::run_node(&args, node, publisher) => {
                let stats = stats?;
                info!(ticks = stats.ticks, applied = stats.applied, dropped = stats.dropped, "node stopped");
            }
            served = trailviz_gui::serve(listener, artifacts) => {
                served.context("viewer server failed")?;
            }
        }
        Ok(())
    })
}

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use promstore::Aggregator;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "In-process metrics aggregation over HTTP")]
struct Cli {
    /// Address to serve the HTTP API on
    #[arg(long, default_value = "0.0.0.0:5080")]
    addr: SocketAddr,
    /// JSON aggregator configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Record synthetic HTTP traffic
    #[arg(long)]
    demo: bool,
    /// Period of the synthetic traffic, in milliseconds
    #[arg(long, default_value_t = 100)]
    demo_period_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let config = promstore_cmd::load_config(cli.config.as_deref())?;
    let aggregator = Arc::new(Aggregator::new(config).wrap_err("invalid configuration")?);

    if cli.demo {
        tracing::info!(period_ms = cli.demo_period_ms, "recording synthetic traffic");
        promstore_cmd::spawn_demo(
            Arc::clone(&aggregator),
            Duration::from_millis(cli.demo_period_ms),
        );
    }

    promstore_cmd::http::server(cli.addr, aggregator).await
}

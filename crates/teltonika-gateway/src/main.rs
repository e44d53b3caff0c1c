//! Teltonika ingest gateway binary.

use clap::Parser;
use teltonika_gateway::Config;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Teltonika Codec 8 / 8E ingest gateway.
///
/// All protocol configuration (`FLEET_API_URL`, `SHARED_SECRET`,
/// `TCP_PORT`, `STATUS_PORT`) comes from the environment; the only CLI
/// surface is logging verbosity.
#[derive(Parser, Debug)]
#[command(name = "teltonika-gateway")]
#[command(about = "TCP ingest gateway for Teltonika Codec 8 / 8E telematics devices")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = Config::from_env()?;

    tracing::info!("teltonika gateway starting");

    teltonika_gateway::run(config).await?;

    Ok(())
}

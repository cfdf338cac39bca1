//! Ops Console Gateway
//!
//! Runs the forwarding gateway in front of the orchestration service.

use anyhow::Result;
use clap::Parser;
use ops_console::config::{DEFAULT_FORWARD_TIMEOUT_MS, DEFAULT_UPSTREAM_BASE};
use ops_console::{run_gateway, GatewayConfig};
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ops-gateway")]
#[command(about = "Forwarding gateway for the ops console")]
struct Args {
    /// Upstream orchestration service base URL
    #[arg(long, default_value = DEFAULT_UPSTREAM_BASE, env = "UPSTREAM_API_BASE")]
    upstream: String,

    /// Server port
    #[arg(short, long, default_value = "3000", env = "GATEWAY_PORT")]
    port: u16,

    /// Server host
    #[arg(long, default_value = "0.0.0.0", env = "GATEWAY_HOST")]
    host: String,

    /// Cancellation bound for forwarded POSTs, in milliseconds
    #[arg(long, default_value_t = DEFAULT_FORWARD_TIMEOUT_MS, env = "GATEWAY_FORWARD_TIMEOUT_MS")]
    forward_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ops_console=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = GatewayConfig::new(&args.upstream)?
        .with_listen(&args.host, args.port)
        .with_forward_timeout(Duration::from_millis(args.forward_timeout_ms));

    info!("Starting Ops Console Gateway");
    info!("  Upstream: {}", config.upstream_base);

    run_gateway(config).await
}

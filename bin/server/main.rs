//! Dojo Registry Server
//!
//! Runs the rendezvous registry as a standalone HTTP server.

use anyhow::Result;
use clap::Parser;
use dojo_registry::{DojoConfig, DojoRpc, MonitorConfig, RpcConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "dojo-server")]
#[command(about = "Rendezvous registry that keeps polling registered team servers")]
struct Args {
    /// Shared secret the team tokens are derived from
    #[arg(long, default_value = "", env = "DOJO_SECRET", hide_env_values = true)]
    secret: String,

    /// Number of team slots
    #[arg(long, default_value_t = 20, env = "DOJO_TEAMS")]
    teams: usize,

    /// Server host
    #[arg(long, default_value = "0.0.0.0", env = "DOJO_HOST")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = 8080, env = "DOJO_PORT")]
    port: u16,

    /// Pause between polls of a team server
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Time a poll may take before it counts as timed out
    #[arg(long, default_value_t = 1000)]
    poll_timeout_ms: u64,

    /// Upper bound on a single HTTP request to a team server
    #[arg(long, default_value_t = 30000)]
    request_timeout_ms: u64,

    /// Print every team's token and exit
    #[arg(long)]
    print_tokens: bool,
}

impl Args {
    fn into_config(self) -> DojoConfig {
        DojoConfig {
            secret: self.secret,
            team_count: self.teams,
            monitor: MonitorConfig {
                poll_interval: Duration::from_millis(self.poll_interval_ms),
                poll_timeout: Duration::from_millis(self.poll_timeout_ms),
                request_timeout: Duration::from_millis(self.request_timeout_ms),
            },
            rpc: RpcConfig {
                host: self.host,
                port: self.port,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dojo_registry=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .init();

    let args = Args::parse();
    let print_tokens = args.print_tokens;
    let config = args.into_config();

    if config.secret.is_empty() {
        warn!("DOJO_SECRET is empty; team tokens are derived from an empty secret");
    }

    if print_tokens {
        for (team, token) in config.token_table().iter() {
            println!("{}\t{}", team, token);
        }
        return Ok(());
    }

    info!("Starting Dojo Registry Server");
    info!("  Teams: {}", config.team_count);
    info!(
        "  Poll interval: {:?}, timeout: {:?}",
        config.monitor.poll_interval, config.monitor.poll_timeout
    );
    info!("  Listening on: {}:{}", config.rpc.host, config.rpc.port);

    let service = Arc::new(config.build_service()?);
    let rpc = DojoRpc::new(config.rpc.clone(), service);

    // Start server (blocks until shutdown)
    rpc.start().await?;

    Ok(())
}

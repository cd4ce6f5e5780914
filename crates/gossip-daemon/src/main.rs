//! gossip-daemon: heartbeat failure-detection agent for a static peer group.
//!
//! Loads the peer list from a JSON config, listens for heartbeats over
//! WebSocket, announces itself to one random peer every gossip interval and
//! logs peers that fall silent.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gossip_core::{AgentConfig, MembershipEvent};
use gossip_daemon::{HeartbeatServer, Node, WebSocketTransport};

#[derive(Parser, Debug)]
#[command(name = "gossip-daemon")]
#[command(about = "Heartbeat failure-detection agent")]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Address to listen on (defaults to 0.0.0.0 on the configured port)
    #[arg(short, long)]
    listen: Option<String>,

    /// Seconds between membership status reports (0 disables them)
    #[arg(long, default_value_t = 30)]
    status_interval: u64,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,gossip_core=debug,gossip_daemon=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting gossip-daemon");

    let config = AgentConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    info!("Self address: {}", config.self_address);
    info!("Peers: {} configured", config.peer_addresses.len());

    let listen = args
        .listen
        .unwrap_or_else(|| HeartbeatServer::default_listen_addr(&config.self_address));
    let listener = HeartbeatServer::bind(&listen)
        .await
        .with_context(|| format!("Failed to listen on {}", listen))?;

    let node = Node::start(&config, listener, WebSocketTransport::default())?;

    // Hosting-application hook: surface membership changes in the log
    let _subscription = node.events().subscribe(|event| match event {
        MembershipEvent::MemberLost { address } => {
            warn!("Peer {} presumed dead", address);
        }
        MembershipEvent::MemberResurrected { address } => {
            info!("Peer {} is back", address);
        }
    });

    if args.status_interval > 0 {
        let endpoint = node.endpoint().clone();
        let period = Duration::from_secs(args.status_interval);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                match endpoint.snapshot().await {
                    Ok(snapshot) => info!(
                        "Membership: {} active, {} dead",
                        snapshot.active.len(),
                        snapshot.dead.len()
                    ),
                    Err(_) => break,
                }
            }
        });
    }

    info!("Agent running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    node.shutdown().await;
    Ok(())
}

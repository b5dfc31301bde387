//! signal-hub binary entry point.
//!
//! Usage:
//! ```bash
//! signal-hub --config signal-hub.toml
//! signal-hub --bind 127.0.0.1:7860
//! RUST_LOG=debug signal-hub
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use webrtc_signal_hub::cleanup::spawn_cleanup_task;
use webrtc_signal_hub::{protocol, Config, SignalHub};

/// WebSocket rendezvous hub for WebRTC signaling.
#[derive(Parser, Debug)]
#[command(name = "signal-hub")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults apply when omitted)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Listen address, overriding `server.bind_address`
    #[arg(long, short)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;

    tracing::info!(
        "signal-hub v{} listening on ws://{}{}",
        env!("CARGO_PKG_VERSION"),
        listener.local_addr()?,
        config.server.ws_path
    );

    let cleanup = config.cleanup.clone();
    let hub = Arc::new(SignalHub::new(config));
    let maintenance = spawn_cleanup_task(hub.clone(), cleanup);

    protocol::serve(hub, listener, shutdown_signal())
        .await
        .context("Server error")?;

    maintenance.abort();
    tracing::info!("signal-hub stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

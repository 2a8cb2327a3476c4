//! Ingress router.
//!
//! Serves HTTP traffic by matching each request's host and path against a
//! route table built from ingress objects, and forwarding it to the backend.
//!
//! # Architecture Overview
//!
//! ```text
//!   ingress manifest ──▶ informer ──▶ rule store ──▶ change signal
//!                                                        │
//!                                                        ▼
//!                                            rebuild scheduler (debounce)
//!                                                        │
//!                                                        ▼
//!   Client ──▶ http server ──▶ matcher ◀── ArcSwap ◀── route table
//!                   │
//!                   └──────────────▶ backend <svc>.<ns>.svc:<port>
//! ```

use clap::Parser;
use std::path::PathBuf;

use ingress_router::config::{load_config, validation::validate_config, ConfigError, ProxyConfig};
use ingress_router::lifecycle::{launch, signals, Shutdown};
use ingress_router::observability::logging;

#[derive(Parser)]
#[command(name = "ingress-router")]
#[command(about = "Host and path based router fed by ingress objects", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ingress manifest path, overrides source.manifest_path.
    #[arg(short, long)]
    manifest: Option<String>,

    /// Listen address, overrides listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level, overrides observability.log_level.
    #[arg(long)]
    log_level: Option<String>,
}

fn build_config(cli: &Cli) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    if let Some(manifest) = &cli.manifest {
        config.source.manifest_path = manifest.clone();
    }
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!("ingress-router v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        manifest = %config.source.manifest_path,
        debounce_ms = config.router.debounce_ms,
        wait_for_initial_sync = config.router.wait_for_initial_sync,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let running = launch(&config, &shutdown).await?;
    tracing::info!(address = %running.local_addr, "Listening for connections");
    running.wait().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

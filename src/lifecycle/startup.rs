//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the router and its rebuild scheduler
//! - Start the ingress informer feeding the router
//! - Wait (bounded) for the first route table
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Subsystems initialize in order, not concurrently
//! - The listener is bound before any task is spawned, so a bad address fails cleanly
//! - Requests are served last (only once routes are known, or the wait expired)
//! - A readiness timeout is not fatal: lookups fail open to 404 until a table exists

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::ProxyConfig;
use crate::error::RouterError;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;
use crate::routing::{IngressRouter, RouterSettings};
use crate::source::Informer;

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("router: {0}")]
    Router(#[from] RouterError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Handles to the running subsystems.
pub struct Running {
    pub router: IngressRouter,
    pub local_addr: SocketAddr,
    server: JoinHandle<Result<(), std::io::Error>>,
    background: Vec<JoinHandle<()>>,
}

impl Running {
    /// Wait for the server to stop, then for the background tasks.
    pub async fn wait(self) -> Result<(), std::io::Error> {
        let result = match self.server.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "HTTP server task failed");
                Ok(())
            }
        };

        for task in self.background {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Background task failed");
            }
        }
        result
    }
}

/// Start every subsystem described by `config`.
pub async fn launch(config: &ProxyConfig, shutdown: &Shutdown) -> Result<Running, StartupError> {
    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;
    let local_addr = listener.local_addr().map_err(|source| StartupError::Bind {
        address: config.listener.bind_address.clone(),
        source,
    })?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let router = IngressRouter::new(RouterSettings::from(&config.router));
    let scheduler = router.start(shutdown.token())?;

    let informer = Informer::new(&config.source.manifest_path, Duration::from_secs(config.source.resync_secs))
        .with_watch(config.source.watch);
    tracing::info!(path = ?informer.path(), "Starting ingress informer");
    let informer = tokio::spawn(informer.run(Arc::new(router.clone()), shutdown.token()));

    let ready_timeout = Duration::from_secs(config.router.ready_timeout_secs);
    tokio::select! {
        res = router.wait_until_ready_timeout(ready_timeout) => {
            if let Err(e) = res {
                tracing::warn!(error = %e, "Starting without a route table; requests return 404 until one is built");
            }
        }
        _ = shutdown.triggered() => {
            tracing::info!("Shutdown requested during startup");
        }
    }

    let server = HttpServer::new(Arc::new(router.clone()), &config.timeouts);
    let server = tokio::spawn(server.run(listener, shutdown.token()));

    Ok(Running {
        router,
        local_addr,
        server,
        background: vec![scheduler, informer],
    })
}

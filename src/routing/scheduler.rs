//! Debounced rebuild loop.
//!
//! # State Machine
//! ```text
//! [gated]    --synced-->  initial rebuild --> [idle]
//! [idle]     --signal-->  [debounce] (deadline = now + window)
//! [debounce] --signal-->  [debounce] (drained, deadline unchanged)
//! [debounce] --deadline-> rebuild --> [idle]
//! any state  --cancel-->  stopped
//! ```
//!
//! # Design Decisions
//! - Single flight: rebuilds run one at a time inside this loop
//! - Rebuilds run on the blocking pool; a panic is logged and the loop resumes
//! - Cancellation is observed between rebuilds, never in the middle of one

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::observability::metrics;

/// Rebuild action run after each settled burst.
pub type RebuildFn = Arc<dyn Fn() + Send + Sync>;

enum Window {
    Elapsed,
    Closed,
    Cancelled,
}

/// Collapses bursts of change signals into single rebuilds.
pub struct RebuildScheduler {
    signals: mpsc::Receiver<()>,
    synced: Option<watch::Receiver<bool>>,
    debounce: Duration,
    rebuild: RebuildFn,
}

impl RebuildScheduler {
    pub fn new(signals: mpsc::Receiver<()>, debounce: Duration, rebuild: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            signals,
            synced: None,
            debounce,
            rebuild: Arc::new(rebuild),
        }
    }

    /// Hold the initial rebuild until `synced` turns true.
    pub fn gated_on(mut self, synced: watch::Receiver<bool>) -> Self {
        self.synced = Some(synced);
        self
    }

    /// Run until `cancel` fires or every notifier is dropped.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            debounce_ms = self.debounce.as_millis() as u64,
            gated = self.synced.is_some(),
            "Rebuild scheduler starting"
        );

        if let Some(mut synced) = self.synced.take() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Rebuild scheduler cancelled before initial sync");
                    return;
                }
                res = async { synced.wait_for(|done| *done).await.map(|_| ()) } => {
                    if res.is_err() {
                        tracing::warn!("Sync signal dropped before initial sync, building anyway");
                    }
                }
            }
        }

        // Signals queued so far are covered by the initial build.
        while self.signals.try_recv().is_ok() {}
        self.rebuild().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                signal = self.signals.recv() => {
                    if signal.is_none() {
                        break;
                    }
                }
            }

            match self.debounce(&cancel).await {
                Window::Elapsed => self.rebuild().await,
                Window::Closed => {
                    self.rebuild().await;
                    break;
                }
                Window::Cancelled => break,
            }
        }

        tracing::info!("Rebuild scheduler stopped");
    }

    async fn debounce(&mut self, cancel: &CancellationToken) -> Window {
        let deadline = time::sleep_until(Instant::now() + self.debounce);
        tokio::pin!(deadline);
        let mut open = true;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Window::Cancelled,
                _ = &mut deadline => {
                    return if open { Window::Elapsed } else { Window::Closed };
                }
                signal = self.signals.recv(), if open => {
                    if signal.is_none() {
                        open = false;
                    }
                }
            }
        }
    }

    async fn rebuild(&self) {
        let rebuild = self.rebuild.clone();
        match tokio::task::spawn_blocking(move || rebuild()).await {
            Ok(()) => {}
            Err(e) if e.is_panic() => {
                tracing::error!("Route table rebuild panicked, keeping the previous table");
                metrics::record_rebuild_failure();
            }
            Err(e) => {
                tracing::error!(error = %e, "Route table rebuild did not complete");
                metrics::record_rebuild_failure();
            }
        }
    }
}

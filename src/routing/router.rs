//! Live ingress router.
//!
//! # Responsibilities
//! - Own the rule store, the published route table and the readiness gate
//! - Translate ingress events into store mutations
//! - Rebuild and atomically publish route tables
//! - Answer lookups against the current table without locking
//!
//! # Design Decisions
//! - Explicit context object: no globals, any number of routers per process
//! - `ArcSwapOption` holds the table; readers load it once per lookup
//! - The published generation doubles as the readiness signal (0 = not ready)
//! - Lookups before the first publish fail open to not found
//! - Rebuilds are serialized, so published generations only move forward

use arc_swap::ArcSwapOption;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::RouterConfig;
use crate::error::RouterError;
use crate::ingress::{EventHandler, Ingress, IngressKey, RuleStore};
use crate::observability::metrics;
use crate::routing::matcher::{normalize_host, RouteMatch, RouteMatcher};
use crate::routing::notifier;
use crate::routing::scheduler::RebuildScheduler;
use crate::routing::table::RouteTable;

/// Runtime settings for an [`IngressRouter`].
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Quiet window that collapses a burst of changes into one rebuild.
    pub debounce: Duration,
    /// Capacity of the change signal channel.
    pub signal_capacity: usize,
    /// Hold the first build until the event source reports its initial sync.
    pub wait_for_initial_sync: bool,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(50),
            signal_capacity: 1000,
            wait_for_initial_sync: true,
        }
    }
}

impl From<&RouterConfig> for RouterSettings {
    fn from(config: &RouterConfig) -> Self {
        Self {
            debounce: Duration::from_millis(config.debounce_ms),
            signal_capacity: config.signal_capacity,
            wait_for_initial_sync: config.wait_for_initial_sync,
        }
    }
}

struct RouterInner {
    store: RuleStore,
    table: ArcSwapOption<RouteTable>,
    generation: watch::Sender<u64>,
    synced: watch::Sender<bool>,
    signals: Mutex<Option<mpsc::Receiver<()>>>,
    // Held across snapshot, build and publish.
    rebuild_lock: Mutex<()>,
    settings: RouterSettings,
}

/// Maps `(host, path)` to a backend, kept current from ingress events.
#[derive(Clone)]
pub struct IngressRouter {
    inner: Arc<RouterInner>,
}

impl IngressRouter {
    pub fn new(settings: RouterSettings) -> Self {
        let (notifier, signals) = notifier::channel(settings.signal_capacity);
        let (generation, _) = watch::channel(0);
        let (synced, _) = watch::channel(false);

        Self {
            inner: Arc::new(RouterInner {
                store: RuleStore::new(notifier),
                table: ArcSwapOption::empty(),
                generation,
                synced,
                signals: Mutex::new(Some(signals)),
                rebuild_lock: Mutex::new(()),
                settings,
            }),
        }
    }

    /// Spawn the rebuild scheduler. It runs until `cancel` fires.
    pub fn start(&self, cancel: CancellationToken) -> Result<JoinHandle<()>, RouterError> {
        let signals = self
            .inner
            .signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(RouterError::AlreadyStarted)?;

        let router = self.clone();
        let mut scheduler = RebuildScheduler::new(signals, self.inner.settings.debounce, move || {
            router.rebuild();
        });
        if self.inner.settings.wait_for_initial_sync {
            scheduler = scheduler.gated_on(self.inner.synced.subscribe());
        }

        Ok(tokio::spawn(scheduler.run(cancel)))
    }

    pub fn store(&self) -> &RuleStore {
        &self.inner.store
    }

    /// Insert or replace an ingress. Returns false for an equivalent update.
    pub fn upsert(&self, ingress: Ingress) -> bool {
        self.inner.store.upsert(ingress)
    }

    pub fn remove(&self, key: &IngressKey) -> bool {
        self.inner.store.remove(key)
    }

    /// Open the initial-sync gate. Idempotent.
    pub fn mark_synced(&self) {
        if !self.inner.synced.send_replace(true) {
            tracing::info!(ingresses = self.inner.store.len(), "Initial ingress sync complete");
        }
    }

    pub fn is_synced(&self) -> bool {
        *self.inner.synced.borrow()
    }

    /// Build a table from the current store contents and publish it.
    ///
    /// Normally driven by the scheduler. Concurrent callers run one at a
    /// time, and each sees a snapshot taken after the previous publish.
    pub fn rebuild(&self) -> Arc<RouteTable> {
        let _guard = self.inner.rebuild_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let started = Instant::now();
        let snapshot = self.inner.store.snapshot();
        let generation = *self.inner.generation.borrow() + 1;

        let table = Arc::new(RouteTable::build(&snapshot, generation));
        self.inner.table.store(Some(table.clone()));
        self.inner.generation.send_replace(generation);

        let elapsed = started.elapsed();
        tracing::info!(
            generation,
            ingresses = snapshot.len(),
            hosts = table.host_count(),
            routes = table.route_count(),
            elapsed_us = elapsed.as_micros() as u64,
            "Route table published"
        );
        metrics::record_rebuild(elapsed, table.host_count(), table.route_count());
        table
    }

    /// The currently published table, if any.
    pub fn current(&self) -> Option<Arc<RouteTable>> {
        self.inner.table.load_full()
    }

    /// Generation of the published table (0 before the first publish).
    pub fn generation(&self) -> u64 {
        *self.inner.generation.borrow()
    }

    /// Watch published generations.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.generation.subscribe()
    }

    /// Wait until the first table has been published.
    pub async fn wait_until_ready(&self) {
        let mut rx = self.inner.generation.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|generation| *generation > 0).await;
    }

    pub async fn wait_until_ready_timeout(&self, timeout: Duration) -> Result<(), RouterError> {
        tokio::time::timeout(timeout, self.wait_until_ready())
            .await
            .map_err(|_| RouterError::ReadyTimeout(timeout))
    }

    /// Resolve a request. Never blocks.
    pub fn match_route(&self, host: &str, path: &str) -> Option<RouteMatch> {
        let Some(table) = self.inner.table.load_full() else {
            tracing::warn!(host = %host, path = %path, "Route lookup before the first route table was published");
            metrics::record_match(false);
            return None;
        };

        let host = normalize_host(host);
        let found = table.lookup(&host, path).map(|entry| entry.to_match());
        metrics::record_match(found.is_some());
        found
    }
}

impl Default for IngressRouter {
    fn default() -> Self {
        Self::new(RouterSettings::default())
    }
}

impl fmt::Debug for IngressRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngressRouter")
            .field("generation", &self.generation())
            .field("ingresses", &self.inner.store.len())
            .field("synced", &self.is_synced())
            .finish()
    }
}

impl RouteMatcher for IngressRouter {
    fn match_route(&self, host: &str, path: &str) -> Option<RouteMatch> {
        IngressRouter::match_route(self, host, path)
    }

    fn is_ready(&self) -> bool {
        self.generation() > 0
    }
}

impl EventHandler for IngressRouter {
    fn on_add(&self, ingress: &Ingress) {
        self.upsert(ingress.clone());
    }

    fn on_update(&self, old: &Ingress, new: &Ingress) {
        if old.is_equivalent(new) {
            return;
        }
        self.upsert(new.clone());
    }

    fn on_delete(&self, ingress: &Ingress) {
        self.remove(&ingress.key());
    }

    fn on_synced(&self) {
        self.mark_synced();
    }
}

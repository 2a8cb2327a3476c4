//! List-then-watch ingress informer.
//!
//! # Responsibilities
//! - Deliver the initial listing as adds, then report the source as synced
//! - Reload the manifest on file changes and on a periodic resync
//! - Diff each reload against the last delivered set into add/update/delete
//!
//! # Design Decisions
//! - A failed reload keeps the last good set; nothing is deleted on error
//! - Sync is only reported after a successful listing
//! - Resync re-delivers unchanged objects as updates; handlers must be idempotent
//! - A zero resync interval disables periodic resync
//! - Manifest reads go through tokio::fs, never blocking a runtime worker

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval};
use tokio_util::sync::CancellationToken;

use crate::ingress::{EventHandler, Ingress, IngressKey};
use crate::source::manifest::Manifest;
use crate::source::watch::ManifestWatcher;

type Known = BTreeMap<IngressKey, Ingress>;

/// Counts of events delivered by one diff.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiffStats {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Feeds an [`EventHandler`] from a manifest file.
#[derive(Debug, Clone)]
pub struct Informer {
    path: PathBuf,
    resync: Duration,
    watch: bool,
}

impl Informer {
    pub fn new(path: impl Into<PathBuf>, resync: Duration) -> Self {
        Self {
            path: path.into(),
            resync,
            watch: true,
        }
    }

    /// Enable or disable file change notifications (resync still applies).
    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run until `cancel` fires.
    pub async fn run(self, handler: Arc<dyn EventHandler>, cancel: CancellationToken) {
        let (_watcher, mut ticks, mut watching) = if self.watch {
            let (watcher, ticks) = ManifestWatcher::new(&self.path);
            match watcher.run() {
                Ok(w) => (Some(w), ticks, true),
                Err(e) => {
                    tracing::warn!(error = %e, "Manifest watch unavailable, relying on resync");
                    (None, ticks, false)
                }
            }
        } else {
            (None, mpsc::unbounded_channel().1, false)
        };

        let mut known = Known::new();
        let mut synced = false;
        self.sync(handler.as_ref(), &mut known, &mut synced, false).await;

        let mut resync = (!self.resync.is_zero()).then(|| {
            let mut interval = time::interval_at(Instant::now() + self.resync, self.resync);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                tick = ticks.recv(), if watching => match tick {
                    Some(()) => self.sync(handler.as_ref(), &mut known, &mut synced, false).await,
                    None => watching = false,
                },
                _ = next_tick(&mut resync) => self.sync(handler.as_ref(), &mut known, &mut synced, true).await,
            }
        }

        tracing::info!(path = ?self.path, "Informer stopped");
    }

    async fn sync(&self, handler: &dyn EventHandler, known: &mut Known, synced: &mut bool, resync: bool) {
        let manifest = match Manifest::read(&self.path).await {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load ingress manifest, keeping current ingresses");
                return;
            }
        };

        let stats = apply_diff(handler, known, manifest.into_map(), resync);
        tracing::debug!(
            added = stats.added,
            updated = stats.updated,
            deleted = stats.deleted,
            resync,
            "Manifest reconciled"
        );

        if !*synced {
            *synced = true;
            handler.on_synced();
        }
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Deliver the difference between `known` and `current`, then adopt `current`.
pub fn apply_diff(handler: &dyn EventHandler, known: &mut Known, current: Known, resync: bool) -> DiffStats {
    let mut stats = DiffStats::default();

    for (key, old) in known.iter() {
        if !current.contains_key(key) {
            handler.on_delete(old);
            stats.deleted += 1;
        }
    }

    for (key, new) in &current {
        match known.get(key) {
            None => {
                handler.on_add(new);
                stats.added += 1;
            }
            Some(old) if old != new || resync => {
                handler.on_update(old, new);
                stats.updated += 1;
            }
            Some(_) => {}
        }
    }

    *known = current;
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingress::{IngressPath, IngressRule};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    impl EventHandler for Recorder {
        fn on_add(&self, ingress: &Ingress) {
            self.events.lock().unwrap().push(format!("add {}", ingress.key()));
        }
        fn on_update(&self, _old: &Ingress, new: &Ingress) {
            self.events.lock().unwrap().push(format!("update {}", new.key()));
        }
        fn on_delete(&self, ingress: &Ingress) {
            self.events.lock().unwrap().push(format!("delete {}", ingress.key()));
        }
        fn on_synced(&self) {
            self.events.lock().unwrap().push("synced".into());
        }
    }

    fn ingress(name: &str, svc: &str) -> Ingress {
        Ingress::new("ns", name, vec![IngressRule::http("foo.com", vec![IngressPath::new("/", svc, 80)])])
    }

    fn known(items: Vec<Ingress>) -> Known {
        items.into_iter().map(|i| (i.key(), i)).collect()
    }

    #[test]
    fn test_diff() {
        let recorder = Recorder::default();
        let mut state = known(vec![ingress("a", "svc"), ingress("b", "svc")]);

        let stats = apply_diff(&recorder, &mut state, known(vec![ingress("b", "svc2"), ingress("c", "svc")]), false);

        assert_eq!(stats, DiffStats { added: 1, updated: 1, deleted: 1 });
        assert_eq!(recorder.take(), vec!["delete ns/a", "update ns/b", "add ns/c"]);
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_resync_redelivers_unchanged() {
        let recorder = Recorder::default();
        let mut state = known(vec![ingress("a", "svc")]);

        apply_diff(&recorder, &mut state, known(vec![ingress("a", "svc")]), false);
        assert!(recorder.take().is_empty());

        apply_diff(&recorder, &mut state, known(vec![ingress("a", "svc")]), true);
        assert_eq!(recorder.take(), vec!["update ns/a"]);
    }

    fn temp_manifest(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ingress-router-{}-{}.toml", tag, std::process::id()))
    }

    fn manifest_with(names: &[&str]) -> String {
        names
            .iter()
            .map(|n| {
                format!(
                    "[[ingress]]\nnamespace = \"ns\"\nname = \"{}\"\n[[ingress.rules]]\nhost = \"{}.com\"\n[[ingress.rules.http.paths]]\npath = \"/\"\nbackend = {{ service_name = \"svc\", service_port = 80 }}\n\n",
                    n, n
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_run_lists_then_resyncs() {
        let path = temp_manifest("resync");
        std::fs::write(&path, manifest_with(&["a", "b"])).unwrap();

        let recorder = Arc::new(Recorder::default());
        let cancel = CancellationToken::new();
        let informer = Informer::new(&path, Duration::from_millis(100)).with_watch(false);
        let handle = tokio::spawn(informer.run(recorder.clone(), cancel.clone()));

        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recorder.take(), vec!["add ns/a", "add ns/b", "synced"]);

        std::fs::write(&path, manifest_with(&["b"])).unwrap();
        time::sleep(Duration::from_millis(150)).await;
        let events = recorder.take();
        assert!(events.contains(&"delete ns/a".to_string()));
        assert!(!events.contains(&"synced".to_string()));

        cancel.cancel();
        handle.await.unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_zero_resync_disables_periodic_reload() {
        let path = temp_manifest("zero");
        std::fs::write(&path, manifest_with(&["a"])).unwrap();

        let recorder = Arc::new(Recorder::default());
        let cancel = CancellationToken::new();
        let informer = Informer::new(&path, Duration::ZERO).with_watch(false);
        let handle = tokio::spawn(informer.run(recorder.clone(), cancel.clone()));

        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recorder.take(), vec!["add ns/a", "synced"]);

        std::fs::write(&path, manifest_with(&["b"])).unwrap();
        time::sleep(Duration::from_millis(100)).await;
        assert!(recorder.take().is_empty());

        cancel.cancel();
        handle.await.unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_sync_waits_for_successful_listing() {
        let path = temp_manifest("late");
        let _ = std::fs::remove_file(&path);

        let recorder = Arc::new(Recorder::default());
        let cancel = CancellationToken::new();
        let informer = Informer::new(&path, Duration::from_millis(50)).with_watch(false);
        let handle = tokio::spawn(informer.run(recorder.clone(), cancel.clone()));

        time::sleep(Duration::from_millis(80)).await;
        assert!(recorder.take().is_empty());

        std::fs::write(&path, manifest_with(&["a"])).unwrap();
        time::sleep(Duration::from_millis(150)).await;
        let events = recorder.take();
        assert_eq!(&events[..2], &["add ns/a".to_string(), "synced".to_string()]);

        cancel.cancel();
        handle.await.unwrap();
        let _ = std::fs::remove_file(&path);
    }
}

//! Authoritative set of ingress objects.
//!
//! # Responsibilities
//! - Hold the de-duplicated ingresses keyed by `(namespace, name)`
//! - Suppress updates that would not change any route
//! - Signal the rebuild scheduler after every real change
//!
//! # Design Decisions
//! - A single mutex guards the map and is held only for the mutation
//! - Signals are sent after the lock is released
//! - BTreeMap keeps snapshots in identity order, so builds are deterministic

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::ingress::types::{Ingress, IngressKey};
use crate::routing::notifier::ChangeNotifier;

type IngressMap = BTreeMap<IngressKey, Arc<Ingress>>;

/// Thread-safe store of ingress objects.
#[derive(Debug)]
pub struct RuleStore {
    ingresses: Mutex<IngressMap>,
    notifier: ChangeNotifier,
}

impl RuleStore {
    pub fn new(notifier: ChangeNotifier) -> Self {
        Self {
            ingresses: Mutex::new(BTreeMap::new()),
            notifier,
        }
    }

    fn lock(&self) -> MutexGuard<'_, IngressMap> {
        // Map operations cannot leave it half-updated, so a poisoned lock is still usable.
        self.ingresses.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace an ingress. Returns false if the stored one was equivalent.
    pub fn upsert(&self, ingress: Ingress) -> bool {
        let key = ingress.key();
        {
            let mut map = self.lock();
            if let Some(existing) = map.get(&key) {
                if existing.is_equivalent(&ingress) {
                    tracing::debug!(ingress = %key, "Ingress unchanged, skipping");
                    return false;
                }
            }
            map.insert(key.clone(), Arc::new(ingress));
        }

        tracing::info!(ingress = %key, "Ingress stored");
        self.notifier.notify();
        true
    }

    /// Remove an ingress. Returns false if it was not present.
    pub fn remove(&self, key: &IngressKey) -> bool {
        if self.lock().remove(key).is_none() {
            tracing::debug!(ingress = %key, "Ingress not present, nothing to remove");
            return false;
        }

        tracing::info!(ingress = %key, "Ingress removed");
        self.notifier.notify();
        true
    }

    /// Point-in-time copy of all ingresses in identity order.
    pub fn snapshot(&self) -> Vec<Arc<Ingress>> {
        self.lock().values().cloned().collect()
    }

    pub fn get(&self, key: &IngressKey) -> Option<Arc<Ingress>> {
        self.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

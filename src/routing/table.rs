//! Immutable route table.
//!
//! # Responsibilities
//! - Flatten ingress snapshots into per-host route lists
//! - Order each host's routes longest prefix first
//! - Answer lookups for a normalized host and a request path
//!
//! # Design Decisions
//! - Built once per rebuild, never patched; a change produces a new table
//! - O(1) host lookup via HashMap, O(n) prefix scan within the host
//! - Stable sort, so equal-length prefixes keep their build order
//! - Prefix containment is plain string matching, not segment aware

use std::collections::HashMap;
use std::sync::Arc;

use crate::ingress::{backend_address, Ingress};
use crate::routing::matcher::RouteMatch;

/// One routable path under a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub path_prefix: String,
    pub namespace: Arc<str>,
    pub name: Arc<str>,
    pub backend: Arc<str>,
}

impl RouteEntry {
    pub fn to_match(&self) -> RouteMatch {
        RouteMatch {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            backend: self.backend.clone(),
        }
    }
}

/// Host-keyed, prefix-sorted routes built from one store snapshot.
#[derive(Debug, Default)]
pub struct RouteTable {
    generation: u64,
    hosts: HashMap<String, Vec<RouteEntry>>,
    route_count: usize,
}

impl RouteTable {
    /// Build a table from a snapshot of the rule store.
    pub fn build(ingresses: &[Arc<Ingress>], generation: u64) -> Self {
        let mut hosts: HashMap<String, Vec<RouteEntry>> = HashMap::new();
        let mut route_count = 0;

        for ingress in ingresses {
            let namespace: Arc<str> = Arc::from(ingress.namespace.as_str());
            let name: Arc<str> = Arc::from(ingress.name.as_str());

            for rule in &ingress.rules {
                let Some(http) = &rule.http else {
                    continue;
                };
                let bucket = hosts.entry(rule.host.to_ascii_lowercase()).or_default();
                for path in &http.paths {
                    let backend = backend_address(
                        &path.backend.service_name,
                        &ingress.namespace,
                        &path.backend.service_port,
                    );
                    bucket.push(RouteEntry {
                        path_prefix: path.path.clone(),
                        namespace: namespace.clone(),
                        name: name.clone(),
                        backend: Arc::from(backend),
                    });
                    route_count += 1;
                }
            }
        }

        for bucket in hosts.values_mut() {
            bucket.sort_by(|a, b| b.path_prefix.len().cmp(&a.path_prefix.len()));
        }

        Self {
            generation,
            hosts,
            route_count,
        }
    }

    /// Find the most specific route. `host` must already be normalized.
    pub fn lookup(&self, host: &str, path: &str) -> Option<&RouteEntry> {
        self.hosts
            .get(host)?
            .iter()
            .find(|entry| path.starts_with(entry.path_prefix.as_str()))
    }

    /// Routes for a host in match order.
    pub fn routes(&self, host: &str) -> Option<&[RouteEntry]> {
        self.hosts.get(host).map(Vec::as_slice)
    }

    pub fn hosts(&self) -> impl Iterator<Item = (&str, &[RouteEntry])> {
        self.hosts.iter().map(|(host, routes)| (host.as_str(), routes.as_slice()))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn route_count(&self) -> usize {
        self.route_count
    }
}

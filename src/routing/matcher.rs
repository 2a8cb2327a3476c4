//! Request matching interface.
//!
//! # Responsibilities
//! - Define the hot-path lookup used by the transport layer
//! - Normalize request hostnames (strip port, lowercase)
//! - Provide a fixed-answer matcher for tests and local development
//!
//! # Design Decisions
//! - Host matching is exact after normalization (no wildcards)
//! - Matching never blocks and never fails; not found is `None`

use std::sync::Arc;

/// The result of a successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub namespace: Arc<str>,
    pub name: Arc<str>,
    /// Upstream address with port, e.g. `svc.ns.svc:80`.
    pub backend: Arc<str>,
}

/// Trait for resolving a request to its upstream.
pub trait RouteMatcher: Send + Sync + std::fmt::Debug {
    /// Returns the route for `host` and `path`, or `None` if nothing matches.
    /// `host` may carry a port suffix.
    fn match_route(&self, host: &str, path: &str) -> Option<RouteMatch>;

    /// Returns true once lookups are answered from a built table.
    fn is_ready(&self) -> bool;
}

/// Strip an optional port and lowercase the hostname.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let host = if host.starts_with('[') {
        // Bracketed IPv6 literal keeps its brackets.
        match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        }
    } else {
        match host.find(':') {
            Some(idx) => &host[..idx],
            None => host,
        }
    };
    host.to_ascii_lowercase()
}

/// Matcher that answers every request with the same upstream.
#[derive(Debug, Clone)]
pub struct StaticMatcher {
    route: RouteMatch,
}

impl StaticMatcher {
    pub fn new(namespace: &str, name: &str, upstream: &str) -> Self {
        Self {
            route: RouteMatch {
                namespace: Arc::from(namespace),
                name: Arc::from(name),
                backend: Arc::from(upstream),
            },
        }
    }
}

impl RouteMatcher for StaticMatcher {
    fn match_route(&self, _host: &str, _path: &str) -> Option<RouteMatch> {
        Some(self.route.clone())
    }

    fn is_ready(&self) -> bool {
        true
    }
}

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the ingress router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Route table rebuild settings.
    pub router: RouterConfig,

    /// Ingress source settings.
    pub source: SourceConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Route table rebuild configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Debounce window in milliseconds.
    pub debounce_ms: u64,

    /// Capacity of the change signal channel.
    pub signal_capacity: usize,

    /// Hold the first build until the source finished its initial listing.
    pub wait_for_initial_sync: bool,

    /// How long startup waits for the first route table.
    pub ready_timeout_secs: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            signal_capacity: 1000,
            wait_for_initial_sync: true,
            ready_timeout_secs: 30,
        }
    }
}

/// Ingress source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Path to the ingress manifest (TOML).
    pub manifest_path: String,

    /// Full resync interval in seconds.
    pub resync_secs: u64,

    /// Reload on file change notifications.
    pub watch: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            manifest_path: "ingresses.toml".to_string(),
            resync_secs: 60,
            watch: true,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter (overridden by RUST_LOG).
    pub log_level: String,

    /// Expose Prometheus metrics.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

//! Ingress ingestion subsystem.
//!
//! # Data Flow
//! ```text
//! event source (add / update / delete / synced)
//!     → EventHandler (implemented by the router)
//!     → store.rs (upsert / remove, no-op suppression)
//!     → change signal to the rebuild scheduler
//! ```

pub mod store;
pub mod types;

pub use store::RuleStore;
pub use types::{
    backend_address, HttpRuleValue, Ingress, IngressBackend, IngressKey, IngressPath, IngressRule, ServicePort,
};

/// Callbacks invoked by an ingress event source.
///
/// Sources follow "list then watch" semantics: every object of the initial
/// listing is delivered through `on_add`, followed by a single `on_synced`.
pub trait EventHandler: Send + Sync {
    fn on_add(&self, ingress: &Ingress);

    fn on_update(&self, old: &Ingress, new: &Ingress);

    fn on_delete(&self, ingress: &Ingress);

    /// The initial listing has been delivered.
    fn on_synced(&self) {}
}

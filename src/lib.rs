//! Ingress router library.
//!
//! Keeps a live `(host, path) → backend` table built from ingress objects
//! and answers lookups without blocking while the table is rebuilt.

pub mod config;
pub mod error;
pub mod http;
pub mod ingress;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod source;

pub use config::schema::ProxyConfig;
pub use error::RouterError;
pub use http::HttpServer;
pub use ingress::{EventHandler, Ingress, IngressKey};
pub use lifecycle::Shutdown;
pub use routing::{IngressRouter, RouteMatch, RouteMatcher, RouterSettings};

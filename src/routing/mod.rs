//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Ingress events
//!     → router.rs (store mutation, change signal)
//!     → notifier.rs (bounded, lossy signal channel)
//!     → scheduler.rs (debounce, single-flight rebuild)
//!     → table.rs (build immutable RouteTable)
//!     → atomic publish (ArcSwap)
//!
//! Incoming Request (host, path)
//!     → matcher.rs (normalize host)
//!     → table.rs (longest prefix lookup)
//!     → Return: RouteMatch or None
//! ```
//!
//! # Design Decisions
//! - Tables are immutable; every change publishes a whole new table
//! - No regex and no wildcard hosts (exact host, prefix path)
//! - Readers never lock; they may see a stale table, never a partial one

pub mod matcher;
pub mod notifier;
pub mod router;
pub mod scheduler;
pub mod table;

pub use matcher::{normalize_host, RouteMatch, RouteMatcher, StaticMatcher};
pub use notifier::ChangeNotifier;
pub use router::{IngressRouter, RouterSettings};
pub use scheduler::RebuildScheduler;
pub use table::{RouteEntry, RouteTable};

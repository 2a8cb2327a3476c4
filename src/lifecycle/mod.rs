//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Router + scheduler → Informer → await first table → HTTP listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → cancel token → scheduler, informer, server stop
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: routing first, then the source, then listeners
//! - One cancellation token tree for every long-running task

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{launch, Running, StartupError};

//! Ingress source subsystem.
//!
//! # Data Flow
//! ```text
//! manifest file (TOML)
//!     → manifest.rs (decode entries, skip malformed)
//!     → watch.rs (file change ticks)
//!     → informer.rs (list, watch, periodic resync, diff)
//!     → EventHandler callbacks (add / update / delete / synced)
//! ```

pub mod informer;
pub mod manifest;
pub mod watch;

pub use informer::{apply_diff, DiffStats, Informer};
pub use manifest::Manifest;
pub use watch::ManifestWatcher;

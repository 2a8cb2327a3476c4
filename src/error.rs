//! Error types shared across subsystems.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the router runtime.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The rebuild scheduler has already been spawned for this router.
    #[error("rebuild scheduler already started")]
    AlreadyStarted,

    /// No route table was published within the allotted time.
    #[error("route table not ready after {0:?}")]
    ReadyTimeout(Duration),
}

/// Errors raised while reading ingress objects from a source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to watch manifest: {0}")]
    Watch(#[from] notify::Error),
}

/// A single manifest entry that could not be turned into an ingress.
#[derive(Debug, Error)]
pub enum ManifestEntryError {
    #[error("entry {index} is malformed: {message}")]
    Malformed { index: usize, message: String },

    #[error("entry {index} has an empty {field}")]
    MissingIdentity { index: usize, field: &'static str },
}

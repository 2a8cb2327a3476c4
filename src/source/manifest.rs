//! Ingress manifest file.
//!
//! A manifest lists ingress objects as `[[ingress]]` tables:
//!
//! ```toml
//! [[ingress]]
//! namespace = "ns1"
//! name = "name1"
//!
//! [[ingress.rules]]
//! host = "foo.com"
//!
//! [[ingress.rules.http.paths]]
//! path = "/"
//! backend = { service_name = "svc11", service_port = 80 }
//! ```
//!
//! Entries are decoded one by one; a malformed entry is logged and skipped
//! without rejecting the rest of the file.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{ManifestEntryError, SourceError};
use crate::ingress::{Ingress, IngressKey};

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    ingress: Vec<toml::Value>,
}

/// Decoded contents of a manifest file.
#[derive(Debug, Default)]
pub struct Manifest {
    ingresses: Vec<Ingress>,
    rejected: usize,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let content = fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Read a manifest without blocking the runtime.
    pub async fn read(path: &Path) -> Result<Self, SourceError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, SourceError> {
        let raw: RawManifest = toml::from_str(content)?;
        let mut manifest = Manifest::default();

        for (index, value) in raw.ingress.into_iter().enumerate() {
            match decode_entry(index, value) {
                Ok(ingress) => manifest.ingresses.push(ingress),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed ingress entry");
                    manifest.rejected += 1;
                }
            }
        }

        Ok(manifest)
    }

    pub fn ingresses(&self) -> &[Ingress] {
        &self.ingresses
    }

    /// Number of entries that were skipped.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Key the ingresses by identity. Later duplicates replace earlier ones.
    pub fn into_map(self) -> BTreeMap<IngressKey, Ingress> {
        let mut map = BTreeMap::new();
        for ingress in self.ingresses {
            let key = ingress.key();
            if map.insert(key.clone(), ingress).is_some() {
                tracing::warn!(ingress = %key, "Duplicate ingress in manifest, keeping the last one");
            }
        }
        map
    }
}

fn decode_entry(index: usize, value: toml::Value) -> Result<Ingress, ManifestEntryError> {
    let ingress: Ingress = value.try_into().map_err(|e: toml::de::Error| ManifestEntryError::Malformed {
        index,
        message: e.message().to_string(),
    })?;

    if ingress.namespace.is_empty() {
        return Err(ManifestEntryError::MissingIdentity { index, field: "namespace" });
    }
    if ingress.name.is_empty() {
        return Err(ManifestEntryError::MissingIdentity { index, field: "name" });
    }
    Ok(ingress)
}

//! Engine manifest registry.
//!
//! Maps an engine identifier to the `{file, class}` descriptor naming the
//! routine that serves it. The manifest is read from disk on first use and
//! served from a cached snapshot until [`ManifestRegistry::flush`] is called.

mod generate;

pub use generate::{generate_manifest, write_manifest};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Identifiers renamed after they were first published.
pub const LEGACY_ALIASES: &[(&str, &str)] = &[("ddg", "duckduckgo")];

/// Errors from manifest lookups.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid engine identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("Engine not found: {0}")]
    NotFound(String),
    #[error("Manifest unavailable: {0}")]
    ManifestUnavailable(String),
}

/// Where a routine implementation lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineDescriptor {
    /// Normalized identifier (the manifest key).
    #[serde(skip)]
    pub identifier: String,
    /// Module location inside the routine catalog.
    #[serde(rename = "file")]
    pub module_location: String,
    /// Entry point within that module.
    #[serde(rename = "class")]
    pub entry_point: String,
}

impl EngineDescriptor {
    pub fn new(identifier: &str, module_location: &str, entry_point: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            module_location: module_location.to_string(),
            entry_point: entry_point.to_string(),
        }
    }
}

/// Normalize a client-supplied engine identifier.
///
/// Trims, lowercases and turns hyphens into underscores, then rejects
/// anything left outside `[a-z0-9_]`.
pub fn normalize_identifier(raw: &str) -> Result<String, RegistryError> {
    let normalized: String = raw
        .trim()
        .chars()
        .map(|c| if c == '-' { '_' } else { c.to_ascii_lowercase() })
        .collect();

    if normalized.is_empty()
        || !normalized
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(RegistryError::InvalidIdentifier(raw.to_string()));
    }

    Ok(normalized)
}

/// Map a legacy identifier to its canonical name.
pub fn canonical_identifier(identifier: &str) -> &str {
    LEGACY_ALIASES
        .iter()
        .find(|(legacy, _)| *legacy == identifier)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(identifier)
}

type Snapshot = Arc<BTreeMap<String, EngineDescriptor>>;

enum ManifestSource {
    File(PathBuf),
    Static(Vec<EngineDescriptor>),
}

/// Cached, read-mostly view of the engine manifest.
pub struct ManifestRegistry {
    source: ManifestSource,
    cached: RwLock<Option<Snapshot>>,
}

impl ManifestRegistry {
    /// Registry backed by a manifest file on disk.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ManifestSource::File(path.into()),
            cached: RwLock::new(None),
        }
    }

    /// Registry over a fixed set of descriptors (tests and embedding).
    pub fn from_descriptors(descriptors: Vec<EngineDescriptor>) -> Self {
        Self {
            source: ManifestSource::Static(descriptors),
            cached: RwLock::new(None),
        }
    }

    /// Path of the backing manifest file, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            ManifestSource::File(p) => Some(p),
            ManifestSource::Static(_) => None,
        }
    }

    /// Whether the backing manifest is present.
    pub fn exists(&self) -> bool {
        match &self.source {
            ManifestSource::File(p) => p.is_file(),
            ManifestSource::Static(_) => true,
        }
    }

    /// Resolve an identifier to its descriptor.
    pub fn resolve(&self, identifier: &str) -> Result<EngineDescriptor, RegistryError> {
        let normalized = normalize_identifier(identifier)?;
        let key = canonical_identifier(&normalized);
        let snapshot = self.snapshot()?;

        snapshot
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(key.to_string()))
    }

    /// Number of engines in the manifest (0 if it cannot be loaded).
    pub fn len(&self) -> usize {
        self.snapshot().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All known identifiers, sorted.
    pub fn identifiers(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self.snapshot()?.keys().cloned().collect())
    }

    /// Drop the cached snapshot so the next lookup reloads the manifest.
    pub fn flush(&self) {
        if let Ok(mut guard) = self.cached.write() {
            *guard = None;
        }
    }

    fn snapshot(&self) -> Result<Snapshot, RegistryError> {
        if let Ok(guard) = self.cached.read() {
            if let Some(ref snapshot) = *guard {
                return Ok(Arc::clone(snapshot));
            }
        }

        let loaded = Arc::new(self.load()?);
        if let Ok(mut guard) = self.cached.write() {
            // Another caller may have loaded it meanwhile; keep theirs
            if let Some(ref existing) = *guard {
                return Ok(Arc::clone(existing));
            }
            *guard = Some(Arc::clone(&loaded));
        }
        Ok(loaded)
    }

    fn load(&self) -> Result<BTreeMap<String, EngineDescriptor>, RegistryError> {
        let entries: Vec<(String, EngineDescriptor)> = match &self.source {
            ManifestSource::File(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    RegistryError::ManifestUnavailable(format!("{}: {}", path.display(), e))
                })?;
                let raw: serde_json::Map<String, serde_json::Value> =
                    serde_json::from_str(&contents).map_err(|e| {
                        RegistryError::ManifestUnavailable(format!("{}: {}", path.display(), e))
                    })?;
                debug!("Loaded manifest {} ({} entries)", path.display(), raw.len());

                raw.into_iter()
                    .filter_map(|(key, value)| {
                        match serde_json::from_value::<EngineDescriptor>(value) {
                            Ok(d) => Some((key, d)),
                            Err(e) => {
                                warn!("Skipping manifest entry {:?}: {}", key, e);
                                None
                            }
                        }
                    })
                    .collect()
            }
            ManifestSource::Static(descriptors) => descriptors
                .iter()
                .map(|d| (d.identifier.clone(), d.clone()))
                .collect(),
        };

        let mut map = BTreeMap::new();
        for (key, mut descriptor) in entries {
            let identifier = match normalize_identifier(&key) {
                Ok(id) => canonical_identifier(&id).to_string(),
                Err(_) => {
                    warn!("Skipping manifest entry with invalid identifier {:?}", key);
                    continue;
                }
            };
            if map.contains_key(&identifier) {
                warn!("Duplicate manifest identifier {:?}, keeping first", identifier);
                continue;
            }
            descriptor.identifier = identifier.clone();
            map.insert(identifier, descriptor);
        }

        Ok(map)
    }
}

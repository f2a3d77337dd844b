//! Manifest generation from the compiled-in routine catalog.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{info, warn};

use super::{canonical_identifier, normalize_identifier, EngineDescriptor};
use crate::routines::RoutineCatalog;

/// Build `{identifier: descriptor}` for every routine in the catalog.
///
/// The identifier is the module's base name, normalized and with legacy
/// names renamed. Entries come back sorted by identifier.
pub fn generate_manifest(catalog: &RoutineCatalog) -> BTreeMap<String, EngineDescriptor> {
    let mut manifest = BTreeMap::new();

    for (module, entry_point) in catalog.entries() {
        let base = module.rsplit('/').next().unwrap_or(module);
        let identifier = match normalize_identifier(base) {
            Ok(id) => canonical_identifier(&id).to_string(),
            Err(e) => {
                warn!("Skipping routine module {}: {}", module, e);
                continue;
            }
        };

        manifest
            .entry(identifier.clone())
            .or_insert_with(|| EngineDescriptor::new(&identifier, module, entry_point));
    }

    manifest
}

/// Write a manifest as pretty-printed JSON.
pub fn write_manifest(
    path: &Path,
    manifest: &BTreeMap<String, EngineDescriptor>,
) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(manifest)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json + "\n")?;
    info!("Wrote {} engines to {}", manifest.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestRegistry;
    use tempfile::tempdir;

    #[test]
    fn test_generate_renames_legacy_and_sorts() {
        let manifest = generate_manifest(&RoutineCatalog::builtin());
        let keys: Vec<&String> = manifest.keys().collect();

        assert_eq!(keys, vec!["duckduckgo", "mojeek"]);
        assert_eq!(manifest["duckduckgo"].module_location, "routines/ddg");
        assert_eq!(manifest["duckduckgo"].entry_point, "ddg");
    }

    #[test]
    fn test_written_manifest_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/manifest.json");
        write_manifest(&path, &generate_manifest(&RoutineCatalog::builtin())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains(r#""file": "routines/mojeek""#));

        let registry = ManifestRegistry::from_path(&path);
        assert_eq!(registry.resolve("ddg").unwrap().entry_point, "ddg");
        assert_eq!(registry.len(), 2);
    }
}

//! Manifest commands.

use std::path::Path;

use crate::config::Settings;
use crate::manifest::{generate_manifest, write_manifest, ManifestRegistry};
use crate::routines::RoutineCatalog;

/// Write the manifest for the built-in routine catalog.
pub fn cmd_generate(settings: &Settings, output: Option<&Path>) -> anyhow::Result<()> {
    let path = output.unwrap_or(&settings.manifest_path);
    let manifest = generate_manifest(&RoutineCatalog::builtin());
    write_manifest(path, &manifest)?;
    println!("Wrote {} engines to {}", manifest.len(), path.display());
    Ok(())
}

/// List engines in the configured manifest.
pub fn cmd_list(settings: &Settings) -> anyhow::Result<()> {
    let registry = ManifestRegistry::from_path(&settings.manifest_path);
    for identifier in registry.identifiers()? {
        let descriptor = registry.resolve(&identifier)?;
        println!(
            "{:<20} {} ({})",
            identifier, descriptor.module_location, descriptor.entry_point
        );
    }
    Ok(())
}

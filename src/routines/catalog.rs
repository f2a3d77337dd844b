//! Compiled-in routine catalog.
//!
//! Manifest descriptors name a module location and an entry point; the
//! catalog maps those names to constructors for routines built into this
//! crate. Nothing is loaded from disk.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{duckduckgo, mojeek, RoutineContext, SearchRoutine};
use crate::manifest::EngineDescriptor;

/// Builds a routine around its per-call context.
pub type RoutineFactory = fn(Arc<RoutineContext>) -> Box<dyn SearchRoutine>;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Routine module not found: {0}")]
    ModuleNotFound(String),
    #[error("Entry point {entry_point:?} not found in module {module}")]
    EntryPointNotFound { module: String, entry_point: String },
}

/// Registry of routine constructors keyed by module then entry point.
#[derive(Default, Clone)]
pub struct RoutineCatalog {
    modules: BTreeMap<String, BTreeMap<String, RoutineFactory>>,
}

impl RoutineCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the routines shipped in this crate.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register("routines/ddg", "ddg", duckduckgo::factory);
        catalog.register("routines/mojeek", "mojeek", mojeek::factory);
        catalog
    }

    pub fn register(&mut self, module: &str, entry_point: &str, factory: RoutineFactory) {
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(entry_point.to_string(), factory);
    }

    /// Look up the constructor a descriptor points at.
    pub fn load(&self, descriptor: &EngineDescriptor) -> Result<LoadedRoutine, LoadError> {
        let module = self
            .modules
            .get(&descriptor.module_location)
            .ok_or_else(|| LoadError::ModuleNotFound(descriptor.module_location.clone()))?;

        let factory = module.get(&descriptor.entry_point).copied().ok_or_else(|| {
            LoadError::EntryPointNotFound {
                module: descriptor.module_location.clone(),
                entry_point: descriptor.entry_point.clone(),
            }
        })?;

        Ok(LoadedRoutine {
            descriptor: descriptor.clone(),
            factory,
        })
    }

    /// `(module, entry_point)` pairs, sorted.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.modules.iter().flat_map(|(module, entries)| {
            entries
                .keys()
                .map(move |entry| (module.as_str(), entry.as_str()))
        })
    }

    pub fn len(&self) -> usize {
        self.modules.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A resolved, not yet instantiated routine.
#[derive(Clone)]
pub struct LoadedRoutine {
    descriptor: EngineDescriptor,
    factory: RoutineFactory,
}

impl LoadedRoutine {
    pub fn descriptor(&self) -> &EngineDescriptor {
        &self.descriptor
    }

    pub fn instantiate(&self, context: Arc<RoutineContext>) -> Box<dyn SearchRoutine> {
        (self.factory)(context)
    }
}

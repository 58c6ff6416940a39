//! Named engine registry.
//!
//! An explicit object handed to whoever needs named engines; create one,
//! populate it from a context and `destroy` it to start over.

use crate::engine::ResolutionEngine;
use crate::error::RegistryError;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Name looked up by [`EngineRegistry::get_default`]
pub const DEFAULT_ENGINE: &str = "default";

pub struct EngineRegistry {
    engines: RwLock<HashMap<String, Arc<ResolutionEngine>>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self {
            engines: RwLock::new(HashMap::new()),
        }
    }

    /// Fill an empty registry in one step.
    pub fn populate(
        &self,
        engines: impl IntoIterator<Item = (String, Arc<ResolutionEngine>)>,
    ) -> Result<(), RegistryError> {
        let mut current = self.engines.write().unwrap_or_else(PoisonError::into_inner);
        if !current.is_empty() {
            return Err(RegistryError::AlreadyPopulated);
        }

        let mut staged = HashMap::new();
        for (name, engine) in engines {
            if staged.contains_key(&name) {
                return Err(RegistryError::DuplicateName(name));
            }
            staged.insert(name, engine);
        }
        *current = staged;
        Ok(())
    }

    pub fn insert(&self, engine: Arc<ResolutionEngine>) -> Result<(), RegistryError> {
        let mut engines = self.engines.write().unwrap_or_else(PoisonError::into_inner);
        let name = engine.name().to_string();
        if engines.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        engines.insert(name, engine);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<ResolutionEngine>> {
        let engines = self.engines.read().unwrap_or_else(PoisonError::into_inner);
        engines.get(name).cloned()
    }

    pub fn get_default(&self) -> Option<Arc<ResolutionEngine>> {
        self.get(DEFAULT_ENGINE)
    }

    pub fn require(&self, name: &str) -> Result<Arc<ResolutionEngine>, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::Missing(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let engines = self.engines.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = engines.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.engines.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every engine; the registry can be populated again afterwards.
    pub fn destroy(&self) {
        self.engines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

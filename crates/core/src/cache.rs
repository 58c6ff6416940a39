//! Cache of units materialized by the local source.

use crate::model::UnitRef;
use dashmap::DashMap;
use std::collections::HashMap;

/// Thread-safe `logical name -> unit` map.
///
/// Two threads racing on the same uncached name may both materialize it;
/// whichever inserts first wins and both callers get that unit back.
#[derive(Default)]
pub struct UnitCache {
    units: DashMap<String, UnitRef>,
}

impl UnitCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<UnitRef> {
        self.units.get(name).map(|u| u.value().clone())
    }

    /// Insert unless already present; returns the unit that ends up cached.
    pub fn insert(&self, name: impl Into<String>, unit: UnitRef) -> UnitRef {
        self.units.entry(name.into()).or_insert(unit).value().clone()
    }

    pub fn remove(&self, name: &str) -> Option<UnitRef> {
        self.units.remove(name).map(|(_, unit)| unit)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn snapshot(&self) -> HashMap<String, UnitRef> {
        self.units
            .iter()
            .map(|u| (u.key().clone(), u.value().clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.units.clear();
    }
}

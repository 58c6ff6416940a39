//! Host providers backing the system, parent, current and thread-context sources.

use crate::error::Result;
use crate::model::{Unit, UnitRef};
use dashmap::DashMap;
use std::io::{Cursor, Read};
use std::sync::Arc;
use url::Url;

/// A readable resource handed back by a lookup.
pub type ResourceStream = Box<dyn Read + Send>;

/// A loader supplied by the host: answers unit, resource and locator
/// lookups. `Ok(None)` means "not here"; errors are reserved for failures
/// that must abort the whole lookup.
pub trait UnitProvider: Send + Sync {
    /// Label used in unit origins and logs
    fn label(&self) -> &str;

    fn find_unit(&self, name: &str, link_now: bool) -> Result<Option<UnitRef>>;

    fn find_resource(&self, name: &str) -> Result<Option<ResourceStream>>;

    fn find_resource_locator(&self, name: &str) -> Result<Option<Url>>;
}

/// In-memory provider keyed by logical name (units) and raw name (resources).
pub struct MemoryProvider {
    label: String,
    units: DashMap<String, UnitRef>,
    resources: DashMap<String, Arc<[u8]>>,
    locators: DashMap<String, Url>,
}

impl MemoryProvider {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            units: DashMap::new(),
            resources: DashMap::new(),
            locators: DashMap::new(),
        }
    }

    pub fn with_unit(self, name: &str, payload: impl Into<Arc<[u8]>>) -> Self {
        self.add_unit(name, payload);
        self
    }

    pub fn with_resource(self, name: &str, payload: impl Into<Arc<[u8]>>) -> Self {
        self.add_resource(name, payload);
        self
    }

    pub fn with_locator(self, name: &str, locator: Url) -> Self {
        self.add_locator(name, locator);
        self
    }

    pub fn add_unit(&self, name: &str, payload: impl Into<Arc<[u8]>>) -> UnitRef {
        let unit = Arc::new(Unit::hosted(name, payload, self.label.clone()));
        self.units.insert(name.to_string(), unit.clone());
        unit
    }

    pub fn add_resource(&self, name: &str, payload: impl Into<Arc<[u8]>>) {
        self.resources.insert(name.to_string(), payload.into());
    }

    pub fn add_locator(&self, name: &str, locator: Url) {
        self.locators.insert(name.to_string(), locator);
    }
}

impl UnitProvider for MemoryProvider {
    fn label(&self) -> &str {
        &self.label
    }

    fn find_unit(&self, name: &str, link_now: bool) -> Result<Option<UnitRef>> {
        let unit = self.units.get(name).map(|u| u.value().clone());
        if link_now {
            if let Some(unit) = &unit {
                unit.mark_linked();
            }
        }
        Ok(unit)
    }

    fn find_resource(&self, name: &str) -> Result<Option<ResourceStream>> {
        Ok(self
            .resources
            .get(name)
            .map(|r| Box::new(Cursor::new(r.value().clone())) as ResourceStream))
    }

    fn find_resource_locator(&self, name: &str) -> Result<Option<Url>> {
        Ok(self.locators.get(name).map(|l| l.value().clone()))
    }
}

//! The resolution engine.
//!
//! Owns an archive store, a unit cache and a list of [`Source`]s. Lookups
//! ask boot delegation first, then every enabled source in
//! `(priority, insertion)` order; the first match wins.

mod builder;

pub use builder::EngineBuilder;

use crate::cache::UnitCache;
use crate::error::{Result, UnitLoadError};
use crate::model::UnitRef;
use crate::provider::{ResourceStream, UnitProvider};
use crate::source::{BootDelegationSource, LocalSource, Source, SourceKind};
use crate::store::{ArchiveStore, KeyFormat, Root};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};
use url::Url;

/// Handle to a source attached to an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SourceId(u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One row of [`ResolutionEngine::sources`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    pub id: SourceId,
    pub kind: SourceKind,
    pub priority: i32,
    pub enabled: bool,
}

struct Slot {
    id: SourceId,
    source: Arc<dyn Source>,
    priority: i32,
    enabled: bool,
}

/// Attached sources in insertion order plus the pre-sorted lookup order.
struct SourceChain {
    slots: Vec<Slot>,
    ordered: Arc<[Arc<dyn Source>]>,
}

impl SourceChain {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            ordered: Arc::from(Vec::new()),
        }
    }

    fn slot_mut(&mut self, id: SourceId) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|slot| slot.id == id)
    }

    /// Stable sort keeps insertion order among equal priorities.
    fn rebuild(&mut self) {
        let mut enabled: Vec<&Slot> = self.slots.iter().filter(|slot| slot.enabled).collect();
        enabled.sort_by_key(|slot| slot.priority);
        self.ordered = enabled.into_iter().map(|slot| slot.source.clone()).collect();
    }
}

/// Treat a `NotFound` as "no match".
pub(crate) fn not_found_as_none<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(found) => Ok(Some(found)),
        Err(UnitLoadError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

fn is_blank(name: &str) -> bool {
    name.trim().is_empty()
}

pub struct ResolutionEngine {
    name: String,
    store: Arc<ArchiveStore>,
    cache: Arc<UnitCache>,
    local: Arc<LocalSource>,
    boot: Arc<BootDelegationSource>,
    chain: RwLock<SourceChain>,
    next_id: AtomicU64,
}

impl ResolutionEngine {
    pub fn builder(name: impl Into<String>) -> EngineBuilder {
        EngineBuilder::new(name)
    }

    fn from_parts(
        name: String,
        local: Arc<LocalSource>,
        boot: Arc<BootDelegationSource>,
    ) -> Self {
        Self {
            name,
            store: local.store().clone(),
            cache: local.cache().clone(),
            local,
            boot,
            chain: RwLock::new(SourceChain::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &Arc<ArchiveStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<UnitCache> {
        &self.cache
    }

    pub fn local(&self) -> &Arc<LocalSource> {
        &self.local
    }

    pub fn boot_delegation(&self) -> &Arc<BootDelegationSource> {
        &self.boot
    }

    pub fn set_replacement_char(&self, replacement: Option<char>) {
        self.local.set_key_format(KeyFormat::new(replacement));
    }

    // ---- Resolution ----

    /// Resolve and eagerly link a unit.
    pub fn resolve(&self, name: &str) -> Result<UnitRef> {
        self.resolve_with(name, true)
    }

    pub fn resolve_with(&self, name: &str, link_now: bool) -> Result<UnitRef> {
        if is_blank(name) {
            return Err(UnitLoadError::unit_not_found(name));
        }
        if let Some(unit) = self.boot.try_delegate(name, |parent| parent.load_unit(name, link_now))? {
            return Ok(unit);
        }
        debug!("[{}] Resolving unit {}", self.name, name);
        self.first_match(|source| source.load_unit(name, link_now))?
            .ok_or_else(|| UnitLoadError::unit_not_found(name))
    }

    pub fn resolve_resource(&self, name: &str) -> Result<ResourceStream> {
        if is_blank(name) {
            return Err(UnitLoadError::not_found(name));
        }
        if let Some(stream) = self.boot.try_delegate(name, |parent| parent.load_resource_stream(name))? {
            return Ok(stream);
        }
        debug!("[{}] Resolving resource {}", self.name, name);
        self.first_match(|source| source.load_resource_stream(name))?
            .ok_or_else(|| UnitLoadError::not_found(name))
    }

    pub fn resolve_locator(&self, name: &str) -> Result<Url> {
        if is_blank(name) {
            return Err(UnitLoadError::not_found(name));
        }
        if let Some(url) = self.boot.try_delegate(name, |parent| parent.load_resource_locator(name))? {
            return Ok(url);
        }
        debug!("[{}] Resolving locator {}", self.name, name);
        self.first_match(|source| source.load_resource_locator(name))?
            .ok_or_else(|| UnitLoadError::not_found(name))
    }

    /// Every locator for `name`: the boot delegation answer first, then one
    /// per enabled source in lookup order.
    pub fn resolve_all_locators(&self, name: &str) -> Result<Vec<Url>> {
        let mut locators = Vec::new();
        if is_blank(name) {
            return Ok(locators);
        }
        if let Some(url) = self.boot.try_delegate(name, |parent| parent.load_resource_locator(name))? {
            locators.push(url);
        }
        for source in self.snapshot().iter() {
            if let Some(url) = source.load_resource_locator(name)? {
                locators.push(url);
            }
        }
        Ok(locators)
    }

    fn snapshot(&self) -> Arc<[Arc<dyn Source>]> {
        self.chain
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ordered
            .clone()
    }

    fn first_match<T>(&self, lookup: impl Fn(&dyn Source) -> Result<Option<T>>) -> Result<Option<T>> {
        for source in self.snapshot().iter() {
            if let Some(found) = lookup(source.as_ref())? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    // ---- Sources ----

    pub fn add_source(&self, source: Arc<dyn Source>) -> SourceId {
        let priority = source.default_priority();
        self.add_source_with(source, priority, true)
    }

    pub fn add_source_with(&self, source: Arc<dyn Source>, priority: i32, enabled: bool) -> SourceId {
        let id = SourceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(
            "[{}] Adding {} source {} (priority {}, enabled {})",
            self.name,
            source.kind(),
            id,
            priority,
            enabled
        );
        let mut chain = self.chain.write().unwrap_or_else(PoisonError::into_inner);
        chain.slots.push(Slot {
            id,
            source,
            priority,
            enabled,
        });
        chain.rebuild();
        id
    }

    pub fn remove_source(&self, id: SourceId) -> Option<Arc<dyn Source>> {
        let mut chain = self.chain.write().unwrap_or_else(PoisonError::into_inner);
        let index = chain.slots.iter().position(|slot| slot.id == id)?;
        let slot = chain.slots.remove(index);
        chain.rebuild();
        Some(slot.source)
    }

    /// Returns `false` for an unknown id.
    pub fn set_priority(&self, id: SourceId, priority: i32) -> bool {
        let mut chain = self.chain.write().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = chain.slot_mut(id) else {
            return false;
        };
        slot.priority = priority;
        chain.rebuild();
        true
    }

    /// Returns `false` for an unknown id.
    pub fn set_enabled(&self, id: SourceId, enabled: bool) -> bool {
        let mut chain = self.chain.write().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = chain.slot_mut(id) else {
            return false;
        };
        slot.enabled = enabled;
        chain.rebuild();
        true
    }

    /// First attached source of the given kind.
    pub fn source_id(&self, kind: SourceKind) -> Option<SourceId> {
        self.chain
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .iter()
            .find(|slot| slot.source.kind() == kind)
            .map(|slot| slot.id)
    }

    /// Attached sources in lookup order; disabled ones sort among the rest.
    pub fn sources(&self) -> Vec<SourceInfo> {
        let chain = self.chain.read().unwrap_or_else(PoisonError::into_inner);
        let mut infos: Vec<SourceInfo> = chain
            .slots
            .iter()
            .map(|slot| SourceInfo {
                id: slot.id,
                kind: slot.source.kind(),
                priority: slot.priority,
                enabled: slot.enabled,
            })
            .collect();
        infos.sort_by_key(|info| info.priority);
        infos
    }

    // ---- Store & cache ----

    pub fn add(&self, root: &Root) -> Result<usize> {
        let count = self.store.load_root(root)?;
        info!("[{}] Loaded {} entries from {}", self.name, count, root);
        Ok(count)
    }

    pub fn add_all<'a>(&self, roots: impl IntoIterator<Item = &'a Root>) -> Result<usize> {
        let mut total = 0;
        for root in roots {
            total += self.add(root)?;
        }
        Ok(total)
    }

    /// Unpack a jar read from `reader`; its entries carry no locator.
    pub fn add_stream(&self, reader: impl Read) -> Result<usize> {
        self.store.load_archive_stream(None, reader)
    }

    /// Drop a cached unit, and with `purge` its store entry as well.
    ///
    /// Fails with `NotFound` when nothing was removed.
    pub fn unload_unit(&self, name: &str, purge: bool) -> Result<()> {
        let mut removed = self.cache.remove(name).is_some();
        if purge {
            let key = self.local.key_format().format(name);
            removed |= self.store.unload(&key).is_ok();
        }
        if !removed {
            return Err(UnitLoadError::unit_not_found(name));
        }
        debug!("[{}] Unloaded {} (purge: {})", self.name, name, purge);
        Ok(())
    }

    pub fn loaded_units(&self) -> HashMap<String, UnitRef> {
        self.cache.snapshot()
    }

    pub fn loaded_resources(&self) -> HashMap<String, Arc<[u8]>> {
        self.store.resources()
    }
}

impl fmt::Debug for ResolutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionEngine")
            .field("name", &self.name)
            .field("entries", &self.store.len())
            .field("units", &self.cache.len())
            .finish()
    }
}

/// An engine can back another engine's host sources.
impl UnitProvider for ResolutionEngine {
    fn label(&self) -> &str {
        &self.name
    }

    fn find_unit(&self, name: &str, link_now: bool) -> Result<Option<UnitRef>> {
        not_found_as_none(self.resolve_with(name, link_now))
    }

    fn find_resource(&self, name: &str) -> Result<Option<ResourceStream>> {
        not_found_as_none(self.resolve_resource(name))
    }

    fn find_resource_locator(&self, name: &str) -> Result<Option<Url>> {
        not_found_as_none(self.resolve_locator(name))
    }
}

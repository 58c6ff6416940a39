//! Archive-backed resource store.
//!
//! Holds every payload ingested from jars, directory trees and remote
//! locators under a unique key. Ingestion lives in [`ingest`]; the dotted
//! name to key mapping used by the local source lives in [`key`].

pub mod fetch;
pub mod ingest;
pub mod key;

pub use fetch::{HttpFetcher, RemoteFetcher};
pub use ingest::Root;
pub use key::{KeyFormat, format_key};

use crate::error::{Result, UnitLoadError};
use crate::model::{EntryOrigin, ResourceEntry};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, trace};
use url::Url;

/// What to do when an ingested key is already present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollisionPolicy {
    /// Fail the ingestion call with [`UnitLoadError::Collision`]
    #[serde(rename = "reject")]
    Reject,
    /// Skip the new entry and keep the payload loaded first
    #[default]
    #[serde(rename = "suppress")]
    IgnoreKeepFirst,
}

/// What to do when a local path handed to the store does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPathPolicy {
    #[default]
    Ignore,
    Fail,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorePolicies {
    pub collision: CollisionPolicy,
    pub missing_path: MissingPathPolicy,
}

/// Thread-safe `key -> ResourceEntry` store.
pub struct ArchiveStore {
    entries: DashMap<String, Arc<ResourceEntry>>,
    policies: RwLock<StorePolicies>,
    fetcher: Arc<dyn RemoteFetcher>,
    /// Serializes ingestion calls against each other
    ingest_lock: Mutex<()>,
}

impl ArchiveStore {
    pub fn new() -> Self {
        Self::with_fetcher(StorePolicies::default(), Arc::new(HttpFetcher::new()))
    }

    pub fn with_policies(policies: StorePolicies) -> Self {
        Self::with_fetcher(policies, Arc::new(HttpFetcher::new()))
    }

    pub fn with_fetcher(policies: StorePolicies, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        Self {
            entries: DashMap::new(),
            policies: RwLock::new(policies),
            fetcher,
            ingest_lock: Mutex::new(()),
        }
    }

    pub fn policies(&self) -> StorePolicies {
        *self.policies.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_collision_policy(&self, collision: CollisionPolicy) {
        self.policies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .collision = collision;
    }

    pub fn set_missing_path_policy(&self, missing_path: MissingPathPolicy) {
        self.policies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .missing_path = missing_path;
    }

    /// Add a single in-memory resource under `key`.
    ///
    /// Returns `false` when the key was already present and the collision
    /// policy kept the earlier payload.
    pub fn add_resource(&self, key: impl Into<String>, payload: impl Into<Arc<[u8]>>) -> Result<bool> {
        let _guard = self.lock_ingestion();
        self.insert(ResourceEntry::new(key, payload, EntryOrigin::Manual))
    }

    pub fn get(&self, key: &str) -> Option<Arc<ResourceEntry>> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    pub fn payload(&self, key: &str) -> Option<Arc<[u8]>> {
        self.entries.get(key).map(|e| e.payload().clone())
    }

    /// Locator of the entry stored under `key`, `None` if absent.
    pub fn locator(&self, key: &str) -> Result<Option<Url>> {
        match self.get(key) {
            Some(entry) => entry.locator().map(Some),
            None => Ok(None),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Snapshot of every entry, sorted by key.
    pub fn entries(&self) -> Vec<Arc<ResourceEntry>> {
        let mut entries: Vec<Arc<ResourceEntry>> =
            self.entries.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.key().cmp(b.key()));
        entries
    }

    /// Snapshot of `key -> payload` for the whole store.
    pub fn resources(&self) -> HashMap<String, Arc<[u8]>> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.payload().clone()))
            .collect()
    }

    /// Remove the entry stored under `key`.
    pub fn unload(&self, key: &str) -> Result<Arc<ResourceEntry>> {
        match self.entries.remove(key) {
            Some((_, entry)) => {
                debug!("Removing resource {}", key);
                Ok(entry)
            }
            None => Err(UnitLoadError::not_found(key)),
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub(crate) fn fetcher(&self) -> &dyn RemoteFetcher {
        self.fetcher.as_ref()
    }

    pub(crate) fn lock_ingestion(&self) -> MutexGuard<'_, ()> {
        self.ingest_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Collision check ahead of reading a payload.
    ///
    /// `Ok(false)` means the key is taken and the entry should be skipped.
    pub(crate) fn admit(&self, key: &str) -> Result<bool> {
        if !self.entries.contains_key(key) {
            return Ok(true);
        }
        match self.policies().collision {
            CollisionPolicy::Reject => Err(UnitLoadError::Collision {
                key: key.to_string(),
            }),
            CollisionPolicy::IgnoreKeepFirst => {
                debug!("Resource {} already loaded; ignoring entry", key);
                Ok(false)
            }
        }
    }

    pub(crate) fn insert(&self, entry: ResourceEntry) -> Result<bool> {
        let collision = self.policies().collision;
        match self.entries.entry(entry.key().to_string()) {
            Entry::Occupied(occupied) => match collision {
                CollisionPolicy::Reject => Err(UnitLoadError::Collision {
                    key: occupied.key().clone(),
                }),
                CollisionPolicy::IgnoreKeepFirst => {
                    debug!("Resource {} already loaded; ignoring entry", occupied.key());
                    Ok(false)
                }
            },
            Entry::Vacant(vacant) => {
                trace!(
                    "Loaded {} ({} bytes, {})",
                    entry.key(),
                    entry.metadata().size,
                    entry.metadata().origin.as_str()
                );
                vacant.insert(Arc::new(entry));
                Ok(true)
            }
        }
    }
}

impl Default for ArchiveStore {
    fn default() -> Self {
        Self::new()
    }
}

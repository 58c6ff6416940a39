//! Stored resource entries.

use crate::error::{Result, UnitLoadError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use url::Url;
use xxhash_rust::xxh3::xxh3_64;

/// Suffix of compiled unit payloads.
pub const UNIT_SUFFIX: &str = ".class";
/// Suffix of archives that are unpacked on ingestion.
pub const ARCHIVE_SUFFIX: &str = ".jar";

/// Payload classification guessed from a resource name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Unit,
    Properties,
    Xml,
    Unknown,
}

impl ResourceType {
    pub fn guess(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(UNIT_SUFFIX) {
            ResourceType::Unit
        } else if lower.ends_with(".properties") {
            ResourceType::Properties
        } else if lower.ends_with(".xml") {
            ResourceType::Xml
        } else {
            ResourceType::Unknown
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceType::Unit => "unit",
            ResourceType::Properties => "properties",
            ResourceType::Xml => "xml",
            ResourceType::Unknown => "resource",
        };
        f.write_str(label)
    }
}

/// How an entry got into the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryOrigin {
    Archive,
    Directory,
    Remote,
    Stream,
    Manual,
}

impl EntryOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryOrigin::Archive => "archive",
            EntryOrigin::Directory => "directory",
            EntryOrigin::Remote => "remote",
            EntryOrigin::Stream => "stream",
            EntryOrigin::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntryMetadata {
    pub size: u64,
    /// xxh3-64 of the payload
    pub digest: u64,
    pub origin: EntryOrigin,
}

/// A single stored payload. Immutable once inserted into an [`ArchiveStore`].
///
/// `base_locator` is the locator prefix the entry key is appended to when a
/// locator is requested (`jar:file:///libs/a.jar!/` for archive members, the
/// directory URL for files read from disk). Entries without one, such as
/// single remote resources, cannot be addressed by locator.
///
/// [`ArchiveStore`]: crate::store::ArchiveStore
#[derive(Debug, Clone)]
pub struct ResourceEntry {
    key: String,
    payload: Arc<[u8]>,
    base_locator: Option<String>,
    metadata: EntryMetadata,
}

impl ResourceEntry {
    pub fn new(key: impl Into<String>, payload: impl Into<Arc<[u8]>>, origin: EntryOrigin) -> Self {
        let payload = payload.into();
        let metadata = EntryMetadata {
            size: payload.len() as u64,
            digest: xxh3_64(&payload),
            origin,
        };
        Self {
            key: key.into(),
            payload,
            base_locator: None,
            metadata,
        }
    }

    pub fn with_base_locator(mut self, base: impl Into<String>) -> Self {
        self.base_locator = Some(base.into());
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn payload(&self) -> &Arc<[u8]> {
        &self.payload
    }

    pub fn bytes(&self) -> &[u8] {
        &self.payload
    }

    pub fn base_locator(&self) -> Option<&str> {
        self.base_locator.as_deref()
    }

    pub fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }

    /// Locator addressing this entry: `base_locator + key`.
    pub fn locator(&self) -> Result<Url> {
        let base = self
            .base_locator
            .as_deref()
            .ok_or_else(|| UnitLoadError::NoLocator {
                key: self.key.clone(),
            })?;
        let raw = format!("{}{}", base, self.key);
        Url::parse(&raw).map_err(|_| UnitLoadError::InvalidLocator(raw))
    }
}

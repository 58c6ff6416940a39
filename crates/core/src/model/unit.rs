//! Materialized units.

use super::resource::ResourceEntry;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use xxhash_rust::xxh3::xxh3_64;

pub type UnitRef = Arc<Unit>;

/// Where a unit was materialized from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UnitOrigin {
    /// Materialized by the local source from an archive store entry
    Local {
        key: String,
        base_locator: Option<String>,
    },
    /// Produced by a host provider
    Host { provider: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClassKind {
    Class,
    Interface,
    Enum,
    Annotation,
}

/// Structure the materializer recovered from the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UnitShape {
    Opaque,
    Class {
        kind: ClassKind,
        methods: Vec<String>,
    },
}

/// The in-memory, invocable representation of a stored payload.
#[derive(Debug)]
pub struct Unit {
    name: String,
    payload: Arc<[u8]>,
    origin: UnitOrigin,
    shape: UnitShape,
    linked: AtomicBool,
}

impl Unit {
    pub fn new(
        name: impl Into<String>,
        payload: impl Into<Arc<[u8]>>,
        origin: UnitOrigin,
        shape: UnitShape,
    ) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
            origin,
            shape,
            linked: AtomicBool::new(false),
        }
    }

    /// Unit backed by a local store entry (shares the entry payload).
    pub fn from_entry(name: impl Into<String>, entry: &ResourceEntry, shape: UnitShape) -> Self {
        let origin = UnitOrigin::Local {
            key: entry.key().to_string(),
            base_locator: entry.base_locator().map(str::to_string),
        };
        Self::new(name, entry.payload().clone(), origin, shape)
    }

    /// Unit handed out by a host provider.
    pub fn hosted(
        name: impl Into<String>,
        payload: impl Into<Arc<[u8]>>,
        provider: impl Into<String>,
    ) -> Self {
        let origin = UnitOrigin::Host {
            provider: provider.into(),
        };
        Self::new(name, payload, origin, UnitShape::Opaque)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn origin(&self) -> &UnitOrigin {
        &self.origin
    }

    pub fn shape(&self) -> &UnitShape {
        &self.shape
    }

    pub fn digest(&self) -> u64 {
        xxh3_64(&self.payload)
    }

    pub fn is_local(&self) -> bool {
        matches!(self.origin, UnitOrigin::Local { .. })
    }

    pub fn is_linked(&self) -> bool {
        self.linked.load(Ordering::Acquire)
    }

    pub fn mark_linked(&self) {
        self.linked.store(true, Ordering::Release);
    }
}

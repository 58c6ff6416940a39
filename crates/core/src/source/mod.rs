//! Lookup strategies consulted by the resolution engine.
//!
//! Every strategy sits behind the [`Source`] trait. Per-source "no match" is
//! `Ok(None)`; an `Err` aborts the whole lookup.

pub mod boot;
pub mod composite;
pub mod delegate;
pub mod host;
pub mod local;

pub use boot::{ALWAYS_DELEGATED_PREFIX, BootDelegationConfig, BootDelegationSource};
pub use composite::CompositeSource;
pub use delegate::DelegateSource;
pub use host::{HostSource, ThreadContextSource};
pub use local::LocalSource;

use crate::error::Result;
use crate::model::UnitRef;
use crate::provider::ResourceStream;
use serde::Serialize;
use std::fmt;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    System,
    Parent,
    Current,
    ThreadContext,
    BootDelegation,
    Local,
    Composite,
    Delegate,
    Custom,
}

impl SourceKind {
    /// Lower is consulted earlier.
    pub fn default_priority(&self) -> i32 {
        match self {
            SourceKind::BootDelegation => 0,
            SourceKind::Composite | SourceKind::Custom => 5,
            SourceKind::Local => 10,
            SourceKind::Delegate => 15,
            SourceKind::Current => 20,
            SourceKind::Parent => 30,
            SourceKind::ThreadContext => 40,
            SourceKind::System => 50,
        }
    }

    pub fn default_enabled(&self) -> bool {
        !matches!(self, SourceKind::BootDelegation | SourceKind::ThreadContext)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::System => "system",
            SourceKind::Parent => "parent",
            SourceKind::Current => "current",
            SourceKind::ThreadContext => "thread_context",
            SourceKind::BootDelegation => "boot_delegation",
            SourceKind::Local => "local",
            SourceKind::Composite => "composite",
            SourceKind::Delegate => "delegate",
            SourceKind::Custom => "custom",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pluggable lookup strategy.
///
/// Priority and the enabled flag belong to the engine slot the source is
/// attached to; `default_priority` is only the initial value.
pub trait Source: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn default_priority(&self) -> i32 {
        self.kind().default_priority()
    }

    fn load_unit(&self, name: &str, link_now: bool) -> Result<Option<UnitRef>>;

    fn load_resource_stream(&self, name: &str) -> Result<Option<ResourceStream>>;

    fn load_resource_locator(&self, name: &str) -> Result<Option<Url>>;
}

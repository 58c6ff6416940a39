//! Sources forwarding to host-supplied providers.

use super::{Source, SourceKind};
use crate::error::Result;
use crate::model::UnitRef;
use crate::provider::{ResourceStream, UnitProvider};
use crate::thread_context;
use std::sync::Arc;
use url::Url;

/// System, parent or current source. Without a provider it never matches.
pub struct HostSource {
    kind: SourceKind,
    provider: Option<Arc<dyn UnitProvider>>,
}

impl HostSource {
    pub fn system(provider: Option<Arc<dyn UnitProvider>>) -> Self {
        Self {
            kind: SourceKind::System,
            provider,
        }
    }

    pub fn parent(provider: Option<Arc<dyn UnitProvider>>) -> Self {
        Self {
            kind: SourceKind::Parent,
            provider,
        }
    }

    pub fn current(provider: Option<Arc<dyn UnitProvider>>) -> Self {
        Self {
            kind: SourceKind::Current,
            provider,
        }
    }

    pub fn provider(&self) -> Option<&Arc<dyn UnitProvider>> {
        self.provider.as_ref()
    }
}

impl Source for HostSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn load_unit(&self, name: &str, link_now: bool) -> Result<Option<UnitRef>> {
        match &self.provider {
            Some(provider) => provider.find_unit(name, link_now),
            None => Ok(None),
        }
    }

    fn load_resource_stream(&self, name: &str) -> Result<Option<ResourceStream>> {
        match &self.provider {
            Some(provider) => provider.find_resource(name),
            None => Ok(None),
        }
    }

    fn load_resource_locator(&self, name: &str) -> Result<Option<Url>> {
        match &self.provider {
            Some(provider) => provider.find_resource_locator(name),
            None => Ok(None),
        }
    }
}

/// Forwards to whatever provider is installed on the calling thread.
#[derive(Debug, Default)]
pub struct ThreadContextSource;

impl Source for ThreadContextSource {
    fn kind(&self) -> SourceKind {
        SourceKind::ThreadContext
    }

    fn load_unit(&self, name: &str, link_now: bool) -> Result<Option<UnitRef>> {
        match thread_context::current() {
            Some(provider) => provider.find_unit(name, link_now),
            None => Ok(None),
        }
    }

    fn load_resource_stream(&self, name: &str) -> Result<Option<ResourceStream>> {
        match thread_context::current() {
            Some(provider) => provider.find_resource(name),
            None => Ok(None),
        }
    }

    fn load_resource_locator(&self, name: &str) -> Result<Option<Url>> {
        match thread_context::current() {
            Some(provider) => provider.find_resource_locator(name),
            None => Ok(None),
        }
    }
}

use super::{Source, SourceKind};
use crate::error::Result;
use crate::model::UnitRef;
use crate::provider::ResourceStream;
use std::sync::{Arc, PoisonError, RwLock};
use url::Url;

/// Groups sub-sources under one priority slot.
///
/// Sub-sources are tried strictly in insertion order; their own priorities
/// are ignored.
#[derive(Default)]
pub struct CompositeSource {
    sources: RwLock<Vec<Arc<dyn Source>>>,
}

impl CompositeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(self, source: Arc<dyn Source>) -> Self {
        self.push(source);
        self
    }

    pub fn push(&self, source: Arc<dyn Source>) {
        self.sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(source);
    }

    pub fn len(&self) -> usize {
        self.sources.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn first_match<T>(&self, lookup: impl Fn(&dyn Source) -> Result<Option<T>>) -> Result<Option<T>> {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner).clone();
        for source in &sources {
            if let Some(found) = lookup(source.as_ref())? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}

impl Source for CompositeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Composite
    }

    fn load_unit(&self, name: &str, link_now: bool) -> Result<Option<UnitRef>> {
        self.first_match(|s| s.load_unit(name, link_now))
    }

    fn load_resource_stream(&self, name: &str) -> Result<Option<ResourceStream>> {
        self.first_match(|s| s.load_resource_stream(name))
    }

    fn load_resource_locator(&self, name: &str) -> Result<Option<Url>> {
        self.first_match(|s| s.load_resource_locator(name))
    }
}

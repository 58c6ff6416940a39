use super::{Source, SourceKind};
use crate::engine::{ResolutionEngine, not_found_as_none};
use crate::error::Result;
use crate::model::UnitRef;
use crate::provider::ResourceStream;
use std::sync::Arc;
use url::Url;

/// Exposes a second engine as a single source.
///
/// The wrapped engine's `NotFound` becomes "no match"; anything else (a
/// strict boot delegation miss, for one) propagates.
pub struct DelegateSource {
    engine: Arc<ResolutionEngine>,
}

impl DelegateSource {
    /// Wrap `engine`.
    ///
    /// Nothing guards against cycles: if `engine` can reach the engine this
    /// source is added to (through another delegate or a host provider), a
    /// miss recurses until the stack overflows.
    pub fn new(engine: Arc<ResolutionEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<ResolutionEngine> {
        &self.engine
    }
}

impl Source for DelegateSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Delegate
    }

    fn load_unit(&self, name: &str, link_now: bool) -> Result<Option<UnitRef>> {
        not_found_as_none(self.engine.resolve_with(name, link_now))
    }

    fn load_resource_stream(&self, name: &str) -> Result<Option<ResourceStream>> {
        not_found_as_none(self.engine.resolve_resource(name))
    }

    fn load_resource_locator(&self, name: &str) -> Result<Option<Url>> {
        not_found_as_none(self.engine.resolve_locator(name))
    }
}

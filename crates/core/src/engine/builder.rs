use super::ResolutionEngine;
use crate::cache::UnitCache;
use crate::config::{EngineOptions, MaterializerKind};
use crate::error::Result;
use crate::materialize::{ClassFileMaterializer, Materializer, OpaqueMaterializer};
use crate::provider::UnitProvider;
use crate::source::{BootDelegationSource, HostSource, LocalSource, Source, ThreadContextSource};
use crate::store::{ArchiveStore, HttpFetcher, KeyFormat, RemoteFetcher};
use std::sync::Arc;
use std::time::Duration;

/// Assembles an engine with its built-in sources.
///
/// Host providers default to none, so the system, parent and current
/// sources never match until one is supplied.
pub struct EngineBuilder {
    name: String,
    options: EngineOptions,
    system: Option<Arc<dyn UnitProvider>>,
    parent: Option<Arc<dyn UnitProvider>>,
    current: Option<Arc<dyn UnitProvider>>,
    materializer: Option<Arc<dyn Materializer>>,
    fetcher: Option<Arc<dyn RemoteFetcher>>,
}

impl EngineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: EngineOptions::default(),
            system: None,
            parent: None,
            current: None,
            materializer: None,
            fetcher: None,
        }
    }

    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn system_provider(mut self, provider: Arc<dyn UnitProvider>) -> Self {
        self.system = Some(provider);
        self
    }

    pub fn parent_provider(mut self, provider: Arc<dyn UnitProvider>) -> Self {
        self.parent = Some(provider);
        self
    }

    pub fn current_provider(mut self, provider: Arc<dyn UnitProvider>) -> Self {
        self.current = Some(provider);
        self
    }

    /// Overrides the materializer selected by the options.
    pub fn materializer(mut self, materializer: Arc<dyn Materializer>) -> Self {
        self.materializer = Some(materializer);
        self
    }

    /// Overrides the HTTP fetcher built from the remote options.
    pub fn fetcher(mut self, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn build(self) -> Result<ResolutionEngine> {
        let options = self.options;

        let fetcher = self.fetcher.unwrap_or_else(|| {
            Arc::new(HttpFetcher::with_timeouts(
                Duration::from_secs(options.remote.timeout_secs),
                Duration::from_secs(options.remote.connect_timeout_secs),
            ))
        });
        let store = Arc::new(ArchiveStore::with_fetcher(options.store_policies(), fetcher));

        let materializer = self.materializer.unwrap_or_else(|| match options.materializer {
            MaterializerKind::Opaque => Arc::new(OpaqueMaterializer),
            MaterializerKind::ClassFile => Arc::new(ClassFileMaterializer),
        });
        let local = Arc::new(LocalSource::new(
            store,
            Arc::new(UnitCache::new()),
            materializer,
            KeyFormat::new(options.replacement_char),
        ));

        let parent: Arc<dyn Source> = Arc::new(HostSource::parent(self.parent));
        let boot = Arc::new(BootDelegationSource::new(
            parent.clone(),
            options.boot_delegation.clone(),
        )?);

        let engine = ResolutionEngine::from_parts(self.name, local.clone(), boot);

        let builtins: [Arc<dyn Source>; 5] = [
            Arc::new(HostSource::system(self.system)),
            parent,
            Arc::new(HostSource::current(self.current)),
            Arc::new(ThreadContextSource),
            local,
        ];
        for source in builtins {
            let kind = source.kind();
            let settings = options.sources.get(kind);
            engine.add_source_with(
                source,
                settings.order.unwrap_or(kind.default_priority()),
                settings.enabled.unwrap_or(kind.default_enabled()),
            );
        }

        Ok(engine)
    }
}

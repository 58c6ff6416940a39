//! The store-backed source.

use super::{Source, SourceKind};
use crate::cache::UnitCache;
use crate::error::Result;
use crate::materialize::Materializer;
use crate::model::UnitRef;
use crate::provider::ResourceStream;
use crate::store::{ArchiveStore, KeyFormat};
use std::io::Cursor;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{trace, warn};
use url::Url;

/// Resolves units from an [`ArchiveStore`], materializing them on first use
/// and caching the result in a [`UnitCache`].
pub struct LocalSource {
    store: Arc<ArchiveStore>,
    cache: Arc<UnitCache>,
    materializer: Arc<dyn Materializer>,
    key_format: RwLock<KeyFormat>,
}

impl LocalSource {
    pub fn new(
        store: Arc<ArchiveStore>,
        cache: Arc<UnitCache>,
        materializer: Arc<dyn Materializer>,
        key_format: KeyFormat,
    ) -> Self {
        Self {
            store,
            cache,
            materializer,
            key_format: RwLock::new(key_format),
        }
    }

    pub fn store(&self) -> &Arc<ArchiveStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<UnitCache> {
        &self.cache
    }

    pub fn key_format(&self) -> KeyFormat {
        *self.key_format.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_key_format(&self, key_format: KeyFormat) {
        *self.key_format.write().unwrap_or_else(PoisonError::into_inner) = key_format;
    }
}

impl Source for LocalSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }

    fn load_unit(&self, name: &str, link_now: bool) -> Result<Option<UnitRef>> {
        if let Some(unit) = self.cache.get(name) {
            trace!("Unit cache hit: {}", name);
            return Ok(Some(unit));
        }

        let key = self.key_format().format(name);
        let Some(entry) = self.store.get(&key) else {
            return Ok(None);
        };

        let unit = match self.materializer.materialize(name, &entry) {
            Ok(unit) => unit,
            Err(e) => {
                warn!("Failed to materialize {} from {}: {}", name, key, e);
                return Ok(None);
            }
        };

        if link_now {
            if let Err(e) = self.materializer.link(&unit) {
                warn!("Failed to link {}: {}", name, e);
                return Ok(None);
            }
        }

        Ok(Some(self.cache.insert(name, Arc::new(unit))))
    }

    fn load_resource_stream(&self, name: &str) -> Result<Option<ResourceStream>> {
        Ok(self
            .store
            .payload(name)
            .map(|payload| Box::new(Cursor::new(payload)) as ResourceStream))
    }

    fn load_resource_locator(&self, name: &str) -> Result<Option<Url>> {
        self.store.locator(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnitLoadError;
    use crate::materialize::{BoxError, ClassFileMaterializer, OpaqueMaterializer};
    use crate::model::{ResourceEntry, Unit};
    use std::io::Read;

    fn local(materializer: Arc<dyn Materializer>, replacement: Option<char>) -> LocalSource {
        LocalSource::new(
            Arc::new(ArchiveStore::new()),
            Arc::new(UnitCache::new()),
            materializer,
            KeyFormat::new(replacement),
        )
    }

    #[test]
    fn test_load_unit_caches() {
        let source = local(Arc::new(OpaqueMaterializer), None);
        source.store().add_resource("com/acme/Widget.class", b"W".to_vec()).unwrap();

        let first = source.load_unit("com.acme.Widget", true).unwrap().unwrap();
        assert!(first.is_linked());
        assert!(source.cache().contains("com.acme.Widget"));

        // Served from the cache even once the store entry is gone
        source.store().clear();
        let second = source.load_unit("com.acme.Widget", true).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_replacement_char() {
        let source = local(Arc::new(OpaqueMaterializer), Some('_'));
        source.store().add_resource("com_acme_Widget.class", b"W".to_vec()).unwrap();
        assert!(source.load_unit("com.acme.Widget", false).unwrap().is_some());
    }

    #[test]
    fn test_materialize_failure_is_no_match() {
        let source = local(Arc::new(ClassFileMaterializer), None);
        source.store().add_resource("a/Broken.class", b"garbage".to_vec()).unwrap();

        assert!(source.load_unit("a.Broken", false).unwrap().is_none());
        assert!(source.cache().is_empty());
    }

    struct RefusesLink;

    impl Materializer for RefusesLink {
        fn materialize(&self, name: &str, entry: &ResourceEntry) -> std::result::Result<Unit, BoxError> {
            OpaqueMaterializer.materialize(name, entry)
        }

        fn link(&self, _unit: &Unit) -> std::result::Result<(), BoxError> {
            Err("unresolved reference".into())
        }
    }

    #[test]
    fn test_link_failure_is_no_match() {
        let source = local(Arc::new(RefusesLink), None);
        source.store().add_resource("a/Sealed.class", b"S".to_vec()).unwrap();

        assert!(source.load_unit("a.Sealed", true).unwrap().is_none());
        assert!(source.cache().is_empty());

        let unit = source.load_unit("a.Sealed", false).unwrap().unwrap();
        assert!(!unit.is_linked());
        assert!(source.cache().contains("a.Sealed"));
    }

    #[test]
    fn test_resources_use_raw_names() {
        let source = local(Arc::new(OpaqueMaterializer), None);
        source.store().add_resource("app.properties", b"k=v".to_vec()).unwrap();

        let mut buf = String::new();
        source
            .load_resource_stream("app.properties")
            .unwrap()
            .unwrap()
            .read_to_string(&mut buf)
            .unwrap();
        assert_eq!(buf, "k=v");
        assert!(source.load_resource_stream("missing.properties").unwrap().is_none());

        assert!(matches!(
            source.load_resource_locator("app.properties"),
            Err(UnitLoadError::NoLocator { .. })
        ));
        assert!(source.load_resource_locator("missing.properties").unwrap().is_none());
    }
}

//! Dynamic unit loading over a priority-ordered chain of sources.
//!
//! A [`ResolutionEngine`] resolves a logical, dotted name (`com.acme.Widget`)
//! to a materialized [`Unit`], a resource stream or a locator by asking its
//! sources in priority order. The local source is backed by an
//! [`ArchiveStore`] populated from jars, directory trees and remote URLs.
//!
//! ```text
//!   roots (jar / dir / url) ──ingest──▶ ArchiveStore ◀──┐
//!                                                        │
//!   resolve(name) ─▶ BootDelegation ─▶ [sources by priority] ─▶ LocalSource ─▶ UnitCache
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod materialize;
pub mod model;
pub mod provider;
pub mod registry;
pub mod source;
pub mod store;
pub mod thread_context;

pub use cache::UnitCache;
pub use config::{ContextConfig, ContextLoader, EngineConfig, EngineOptions};
pub use engine::{EngineBuilder, ResolutionEngine, SourceId, SourceInfo};
pub use error::{IngestionCause, RegistryError, Result, UnitLoadError};
pub use materialize::{ClassFileMaterializer, Materializer, OpaqueMaterializer};
pub use model::{ResourceEntry, ResourceType, Unit, UnitRef};
pub use provider::{MemoryProvider, ResourceStream, UnitProvider};
pub use registry::EngineRegistry;
pub use source::{Source, SourceKind};
pub use store::{ArchiveStore, CollisionPolicy, MissingPathPolicy, Root};

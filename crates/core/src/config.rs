//! Engine options, environment overrides and declarative contexts.
//!
//! A context is a JSON document describing named engines:
//!
//! ```json
//! {
//!   "engines": [
//!     { "name": "shared", "roots": ["libs/shared.jar"] },
//!     {
//!       "name": "default",
//!       "collision": "reject",
//!       "boot_delegation": { "enabled": true, "patterns": ["sys.*"] },
//!       "sources": { "local": { "order": 1 } },
//!       "delegates": ["shared"],
//!       "roots": ["classes/", "https://repo.example.com/app.jar"]
//!     }
//!   ]
//! }
//! ```

use crate::engine::{EngineBuilder, ResolutionEngine};
use crate::error::{RegistryError, Result, UnitLoadError};
use crate::provider::UnitProvider;
use crate::registry::EngineRegistry;
use crate::source::{BootDelegationConfig, DelegateSource, SourceKind};
use crate::store::{CollisionPolicy, MissingPathPolicy, Root, StorePolicies};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub const ENV_SUPPRESS_COLLISION: &str = "UNITLOAD_SUPPRESS_COLLISION";
pub const ENV_SUPPRESS_MISSING_PATH: &str = "UNITLOAD_SUPPRESS_MISSING_PATH";
pub const ENV_BOOT_DELEGATION: &str = "UNITLOAD_BOOT_DELEGATION";
pub const ENV_BOOT_DELEGATION_STRICT: &str = "UNITLOAD_BOOT_DELEGATION_STRICT";
pub const ENV_BOOT_DELEGATION_PATTERNS: &str = "UNITLOAD_BOOT_DELEGATION_PATTERNS";

/// `order` and `enabled` for one built-in source; unset fields keep the
/// built-in defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub order: Option<i32>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuiltinSources {
    pub system: SourceSettings,
    pub parent: SourceSettings,
    pub current: SourceSettings,
    pub thread_context: SourceSettings,
    pub local: SourceSettings,
}

impl BuiltinSources {
    pub fn get(&self, kind: SourceKind) -> SourceSettings {
        match kind {
            SourceKind::System => self.system,
            SourceKind::Parent => self.parent,
            SourceKind::Current => self.current,
            SourceKind::ThreadContext => self.thread_context,
            SourceKind::Local => self.local,
            _ => SourceSettings::default(),
        }
    }

    fn get_mut(&mut self, kind: SourceKind) -> Option<&mut SourceSettings> {
        match kind {
            SourceKind::System => Some(&mut self.system),
            SourceKind::Parent => Some(&mut self.parent),
            SourceKind::Current => Some(&mut self.current),
            SourceKind::ThreadContext => Some(&mut self.thread_context),
            SourceKind::Local => Some(&mut self.local),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteOptions {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterializerKind {
    #[default]
    Opaque,
    ClassFile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub collision: CollisionPolicy,
    pub missing_path: MissingPathPolicy,
    /// Replaces `.` when mapping names to keys; `None` uses `/`
    pub replacement_char: Option<char>,
    pub boot_delegation: BootDelegationConfig,
    pub sources: BuiltinSources,
    pub remote: RemoteOptions,
    pub materializer: MaterializerKind,
}

fn parse_flag(var: &str, raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => {
            warn!("Ignoring {}={}: expected true or false", var, raw);
            None
        }
    }
}

impl EngineOptions {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        options.apply_env();
        options
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|var| std::env::var(var).ok());
    }

    /// Apply overrides from any `var -> value` lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let flag = |var: &str| lookup(var).and_then(|raw| parse_flag(var, &raw));

        if let Some(suppress) = flag(ENV_SUPPRESS_COLLISION) {
            self.collision = if suppress {
                CollisionPolicy::IgnoreKeepFirst
            } else {
                CollisionPolicy::Reject
            };
        }
        if let Some(suppress) = flag(ENV_SUPPRESS_MISSING_PATH) {
            self.missing_path = if suppress {
                MissingPathPolicy::Ignore
            } else {
                MissingPathPolicy::Fail
            };
        }
        if let Some(enabled) = flag(ENV_BOOT_DELEGATION) {
            self.boot_delegation.enabled = enabled;
        }
        if let Some(strict) = flag(ENV_BOOT_DELEGATION_STRICT) {
            self.boot_delegation.strict = strict;
        }
        if let Some(raw) = lookup(ENV_BOOT_DELEGATION_PATTERNS) {
            self.boot_delegation.patterns = raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }

        for kind in [
            SourceKind::System,
            SourceKind::Parent,
            SourceKind::Current,
            SourceKind::ThreadContext,
            SourceKind::Local,
        ] {
            let var = format!("UNITLOAD_{}_ENABLED", kind.as_str().to_ascii_uppercase());
            if let Some(enabled) = flag(&var) {
                if let Some(settings) = self.sources.get_mut(kind) {
                    settings.enabled = Some(enabled);
                }
            }
        }
    }

    pub fn store_policies(&self) -> StorePolicies {
        StorePolicies {
            collision: self.collision,
            missing_path: self.missing_path,
        }
    }
}

/// One named engine in a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub name: String,
    #[serde(flatten)]
    pub options: EngineOptions,
    /// Engines defined earlier in the same context, attached as delegate sources
    #[serde(default)]
    pub delegates: Vec<String>,
    /// Paths or URLs ingested in order
    #[serde(default)]
    pub roots: Vec<String>,
}

impl EngineConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: EngineOptions::default(),
            delegates: Vec::new(),
            roots: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    pub engines: Vec<EngineConfig>,
}

impl ContextConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| UnitLoadError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }
}

/// Builds every engine of a [`ContextConfig`] and populates a registry.
#[derive(Default)]
pub struct ContextLoader {
    system: Option<Arc<dyn UnitProvider>>,
    parent: Option<Arc<dyn UnitProvider>>,
    current: Option<Arc<dyn UnitProvider>>,
}

impl ContextLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_provider(mut self, provider: Arc<dyn UnitProvider>) -> Self {
        self.system = Some(provider);
        self
    }

    pub fn with_parent_provider(mut self, provider: Arc<dyn UnitProvider>) -> Self {
        self.parent = Some(provider);
        self
    }

    pub fn with_current_provider(mut self, provider: Arc<dyn UnitProvider>) -> Self {
        self.current = Some(provider);
        self
    }

    /// Nothing is registered unless every engine builds and ingests cleanly.
    pub fn load(&self, config: &ContextConfig, registry: &EngineRegistry) -> Result<()> {
        if !registry.is_empty() {
            return Err(RegistryError::AlreadyPopulated.into());
        }

        let mut built: HashMap<String, Arc<ResolutionEngine>> = HashMap::new();
        for engine_config in &config.engines {
            if built.contains_key(&engine_config.name) {
                return Err(RegistryError::DuplicateName(engine_config.name.clone()).into());
            }
            let engine = Arc::new(self.build(engine_config, &built)?);
            built.insert(engine_config.name.clone(), engine);
        }

        info!("Loaded context with {} engines", built.len());
        registry.populate(built)?;
        Ok(())
    }

    fn build(
        &self,
        config: &EngineConfig,
        built: &HashMap<String, Arc<ResolutionEngine>>,
    ) -> Result<ResolutionEngine> {
        let mut builder = EngineBuilder::new(config.name.clone()).options(config.options.clone());
        if let Some(provider) = &self.system {
            builder = builder.system_provider(provider.clone());
        }
        if let Some(provider) = &self.parent {
            builder = builder.parent_provider(provider.clone());
        }
        if let Some(provider) = &self.current {
            builder = builder.current_provider(provider.clone());
        }
        let engine = builder.build()?;

        for delegate in &config.delegates {
            let target = built
                .get(delegate)
                .ok_or_else(|| RegistryError::Missing(delegate.clone()))?;
            engine.add_source(Arc::new(DelegateSource::new(target.clone())));
        }

        for raw in &config.roots {
            engine.add(&Root::parse(raw))?;
        }

        Ok(engine)
    }
}

//! Pattern-gated delegation to the parent source.
//!
//! Names starting with [`ALWAYS_DELEGATED_PREFIX`] or matching one of the
//! configured wildcard patterns resolve exclusively through the parent when
//! boot delegation is enabled. A strict miss aborts the lookup.

use super::{Source, SourceKind};
use crate::error::{Result, UnitLoadError};
use crate::model::UnitRef;
use crate::provider::ResourceStream;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;
use url::Url;

pub const ALWAYS_DELEGATED_PREFIX: &str = "java.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootDelegationConfig {
    pub enabled: bool,
    pub strict: bool,
    pub patterns: Vec<String>,
}

impl Default for BootDelegationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            strict: true,
            patterns: Vec::new(),
        }
    }
}

/// `*` matches any run, `?` one character; everything else is literal.
pub fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("(?i)^");
    let mut buf = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    out.push('$');
    out
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(&wildcard_to_regex(p))
                .map_err(|e| UnitLoadError::Config(format!("invalid boot delegation pattern {p}: {e}")))
        })
        .collect()
}

struct BootState {
    config: BootDelegationConfig,
    compiled: Vec<Regex>,
}

pub struct BootDelegationSource {
    parent: Arc<dyn Source>,
    state: RwLock<BootState>,
}

impl BootDelegationSource {
    pub fn new(parent: Arc<dyn Source>, config: BootDelegationConfig) -> Result<Self> {
        let compiled = compile(&config.patterns)?;
        Ok(Self {
            parent,
            state: RwLock::new(BootState { config, compiled }),
        })
    }

    pub fn config(&self) -> BootDelegationConfig {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .config
            .clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.read().unwrap_or_else(PoisonError::into_inner).config.enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).config.enabled = enabled;
    }

    pub fn set_strict(&self, strict: bool) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).config.strict = strict;
    }

    pub fn set_patterns(&self, patterns: Vec<String>) -> Result<()> {
        let compiled = compile(&patterns)?;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.config.patterns = patterns;
        state.compiled = compiled;
        Ok(())
    }

    pub fn is_match(&self, name: &str) -> bool {
        if name.starts_with(ALWAYS_DELEGATED_PREFIX) {
            return true;
        }
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.compiled.iter().any(|re| re.is_match(name))
    }

    /// `Ok(None)` means "no decision": the caller continues its normal chain.
    pub fn try_delegate<T>(
        &self,
        name: &str,
        lookup: impl FnOnce(&dyn Source) -> Result<Option<T>>,
    ) -> Result<Option<T>> {
        let (enabled, strict) = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            (state.config.enabled, state.config.strict)
        };
        if !enabled || !self.is_match(name) {
            return Ok(None);
        }

        debug!("Boot delegating {} to parent", name);
        match lookup(self.parent.as_ref())? {
            Some(found) => Ok(Some(found)),
            None if strict => Err(UnitLoadError::BootDelegationFatal {
                name: name.to_string(),
            }),
            None => Ok(None),
        }
    }
}

impl Source for BootDelegationSource {
    fn kind(&self) -> SourceKind {
        SourceKind::BootDelegation
    }

    fn load_unit(&self, name: &str, link_now: bool) -> Result<Option<UnitRef>> {
        self.try_delegate(name, |parent| parent.load_unit(name, link_now))
    }

    fn load_resource_stream(&self, name: &str) -> Result<Option<ResourceStream>> {
        self.try_delegate(name, |parent| parent.load_resource_stream(name))
    }

    fn load_resource_locator(&self, name: &str) -> Result<Option<Url>> {
        self.try_delegate(name, |parent| parent.load_resource_locator(name))
    }
}

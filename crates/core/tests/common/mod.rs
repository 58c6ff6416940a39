#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use unitload_core::error::IngestionCause;
use unitload_core::provider::{MemoryProvider, ResourceStream, UnitProvider};
use unitload_core::source::{Source, SourceKind};
use unitload_core::store::RemoteFetcher;
use unitload_core::{Result, UnitRef};
use url::Url;

/// In-memory jar; names ending in `/` become directory entries.
pub fn jar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, payload) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(payload).unwrap();
        }
    }
    zip.finish().unwrap().into_inner()
}

pub fn write_jar(dir: &Path, file_name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, jar_bytes(entries)).unwrap();
    path
}

pub fn write_file(dir: &Path, relative: &str, payload: &[u8]) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, payload).unwrap();
    path
}

pub fn read_all(mut stream: ResourceStream) -> Vec<u8> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).unwrap();
    buf
}

/// Serves canned payloads by URL and counts requests.
#[derive(Default)]
pub struct MemoryFetcher {
    payloads: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, payload: Vec<u8>) -> Self {
        self.payloads.insert(url.to_string(), payload);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RemoteFetcher for MemoryFetcher {
    fn open(&self, url: &Url) -> std::result::Result<Box<dyn Read + Send>, IngestionCause> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.payloads.get(url.as_str()) {
            Some(payload) => Ok(Box::new(Cursor::new(payload.clone()))),
            None => Err(IngestionCause::Transport(format!("404 Not Found: {}", url))),
        }
    }
}

/// A custom source over a [`MemoryProvider`] that counts every lookup.
pub struct CountingSource {
    provider: MemoryProvider,
    calls: AtomicUsize,
}

impl CountingSource {
    pub fn new(label: &str) -> Self {
        Self {
            provider: MemoryProvider::new(label),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_unit(self, name: &str, payload: &[u8]) -> Self {
        self.provider.add_unit(name, payload.to_vec());
        self
    }

    pub fn with_locator(self, name: &str, locator: &str) -> Self {
        self.provider.add_locator(name, Url::parse(locator).unwrap());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Source for CountingSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Custom
    }

    fn load_unit(&self, name: &str, link_now: bool) -> Result<Option<UnitRef>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.provider.find_unit(name, link_now)
    }

    fn load_resource_stream(&self, name: &str) -> Result<Option<ResourceStream>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.provider.find_resource(name)
    }

    fn load_resource_locator(&self, name: &str) -> Result<Option<Url>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.provider.find_resource_locator(name)
    }
}

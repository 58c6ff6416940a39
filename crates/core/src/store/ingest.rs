//! Ingestion of archives, directory trees and remote locators.
//!
//! Every public entry point takes the store's ingestion lock, so a single
//! archive, tree or URL is never interleaved with another ingestion into
//! the same store. Entries inserted before a failure stay in the store.

use super::ArchiveStore;
use super::MissingPathPolicy;
use crate::error::{IngestionCause, Result, UnitLoadError};
use crate::model::{ARCHIVE_SUFFIX, EntryOrigin, ResourceEntry, UNIT_SUFFIX};
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use url::Url;
use walkdir::WalkDir;
use zip::ZipArchive;

/// Something that can be added to a store: a local path or a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Root {
    Path(PathBuf),
    Url(Url),
}

impl Root {
    /// Interpret `raw` as a URL when it carries a scheme, as a path otherwise.
    ///
    /// Single-letter schemes are treated as Windows drive letters.
    pub fn parse(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(url) if url.scheme().len() > 1 => Root::Url(url),
            _ => Root::Path(PathBuf::from(raw)),
        }
    }
}

impl std::fmt::Display for Root {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Root::Path(path) => write!(f, "{}", path.display()),
            Root::Url(url) => write!(f, "{}", url),
        }
    }
}

impl ArchiveStore {
    /// Add a path or URL, dispatching like [`load_path`](Self::load_path)
    /// and [`load_url`](Self::load_url).
    pub fn load_root(&self, root: &Root) -> Result<usize> {
        match root {
            Root::Path(path) => self.load_path(path),
            Root::Url(url) => self.load_url(url),
        }
    }

    /// Unpack a jar file from disk.
    pub fn load_archive_file(&self, path: &Path) -> Result<usize> {
        let _guard = self.lock_ingestion();
        self.ingest_archive_file(path)
    }

    /// Download and unpack a remote jar.
    pub fn load_archive_url(&self, url: &Url) -> Result<usize> {
        let _guard = self.lock_ingestion();
        self.ingest_archive_url(url)
    }

    /// Unpack a jar from an arbitrary stream.
    ///
    /// `base` is the locator of the archive itself; without it the entries
    /// cannot be addressed by locator later.
    pub fn load_archive_stream(&self, base: Option<&str>, mut reader: impl Read) -> Result<usize> {
        let _guard = self.lock_ingestion();
        let origin = base.unwrap_or("<stream>");
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| UnitLoadError::ingestion(origin, e))?;
        let base = base.map(archive_base);
        self.ingest_archive(origin, base, Cursor::new(bytes), EntryOrigin::Stream)
    }

    /// Load a local file or directory tree, honouring the missing-path policy.
    pub fn load_path(&self, path: &Path) -> Result<usize> {
        let _guard = self.lock_ingestion();
        self.ingest_path(path)
    }

    /// Load a single file or walk a directory tree.
    ///
    /// Compiled units (`.class`) are keyed `package_prefix/File.class`,
    /// jars are unpacked, and every other file is keyed by its bare file
    /// name without the package prefix.
    pub fn load_directory_tree(&self, root: &Path, package_prefix: &str) -> Result<usize> {
        let _guard = self.lock_ingestion();
        self.ingest_tree(root, package_prefix)
    }

    /// Load a URL: `file:` URLs go through [`load_path`](Self::load_path),
    /// anything else is fetched remotely.
    pub fn load_url(&self, url: &Url) -> Result<usize> {
        let _guard = self.lock_ingestion();
        if url.scheme() == "file" {
            let path = url
                .to_file_path()
                .map_err(|_| UnitLoadError::ingestion(url.as_str(), IngestionCause::InvalidLocator))?;
            return self.ingest_path(&path);
        }
        self.ingest_remote(url)
    }

    /// Fetch a remote resource. Jars are unpacked; anything else becomes a
    /// single entry keyed by the full URL, with no locator.
    pub fn load_remote_resource(&self, url: &Url) -> Result<usize> {
        let _guard = self.lock_ingestion();
        self.ingest_remote(url)
    }

    fn ingest_path(&self, path: &Path) -> Result<usize> {
        debug!("Resource: {}", path.display());
        if !path.exists() {
            return match self.policies().missing_path {
                MissingPathPolicy::Ignore => {
                    debug!("Path {} does not exist; skipping", path.display());
                    Ok(0)
                }
                MissingPathPolicy::Fail => Err(UnitLoadError::ingestion(
                    path.display().to_string(),
                    IngestionCause::MissingPath,
                )),
            };
        }
        self.ingest_tree(path, "")
    }

    fn ingest_tree(&self, root: &Path, package_prefix: &str) -> Result<usize> {
        if root.is_file() {
            let unit_base = if package_prefix.is_empty() {
                parent_dir_locator(root)?
            } else {
                None
            };
            return self.ingest_file(root, package_prefix, unit_base.as_deref());
        }

        // Unit files found under an unprefixed walk are addressable relative to the root.
        let unit_base = if package_prefix.is_empty() {
            Some(dir_locator(root)?)
        } else {
            None
        };

        let mut inserted = 0;
        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                UnitLoadError::ingestion(root.display().to_string(), std::io::Error::from(e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .parent()
                .and_then(|dir| dir.strip_prefix(root).ok())
                .map(package_of)
                .unwrap_or_default();
            let prefix = join_prefix(package_prefix, &relative);

            inserted += self.ingest_file(entry.path(), &prefix, unit_base.as_deref())?;
        }
        Ok(inserted)
    }

    fn ingest_file(&self, path: &Path, package_prefix: &str, unit_base: Option<&str>) -> Result<usize> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let lower = file_name.to_lowercase();

        if lower.ends_with(ARCHIVE_SUFFIX) {
            return self.ingest_archive_file(path);
        }

        let (key, base) = if lower.ends_with(UNIT_SUFFIX) {
            (join_prefix(package_prefix, &file_name), unit_base.map(str::to_string))
        } else {
            (file_name, parent_dir_locator(path)?)
        };

        if !self.admit(&key)? {
            return Ok(0);
        }

        let payload = std::fs::read(path)
            .map_err(|e| UnitLoadError::ingestion(path.display().to_string(), e))?;
        debug!("Loading resource: {}", key);

        let mut entry = ResourceEntry::new(key, payload, EntryOrigin::Directory);
        if let Some(base) = base {
            entry = entry.with_base_locator(base);
        }
        Ok(usize::from(self.insert(entry)?))
    }

    fn ingest_archive_file(&self, path: &Path) -> Result<usize> {
        let origin = path.display().to_string();
        debug!("Loading jar: {}", origin);
        let file = File::open(path).map_err(|e| UnitLoadError::ingestion(&origin, e))?;
        let url = file_locator(path)?;
        self.ingest_archive(&origin, Some(archive_base(url.as_str())), file, EntryOrigin::Archive)
    }

    fn ingest_archive_url(&self, url: &Url) -> Result<usize> {
        debug!("Loading jar: {}", url);
        let bytes = self.fetch(url)?;
        self.ingest_archive(
            url.as_str(),
            Some(archive_base(url.as_str())),
            Cursor::new(bytes),
            EntryOrigin::Remote,
        )
    }

    fn ingest_remote(&self, url: &Url) -> Result<usize> {
        debug!("Attempting to load a remote resource: {}", url);
        if url.path().to_lowercase().ends_with(ARCHIVE_SUFFIX) {
            return self.ingest_archive_url(url);
        }

        let key = url.to_string();
        let payload = self.fetch(url)?;
        if !self.admit(&key)? {
            return Ok(0);
        }
        Ok(usize::from(self.insert(ResourceEntry::new(key, payload, EntryOrigin::Remote))?))
    }

    /// Walk the archive's entries in order; running out of entries ends the loop.
    fn ingest_archive<R: Read + Seek>(
        &self,
        origin: &str,
        base: Option<String>,
        reader: R,
        kind: EntryOrigin,
    ) -> Result<usize> {
        let mut archive = ZipArchive::new(reader).map_err(|e| UnitLoadError::ingestion(origin, e))?;

        let mut inserted = 0;
        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .map_err(|e| UnitLoadError::ingestion(origin, e))?;
            if file.is_dir() {
                continue;
            }

            let key = file.name().to_string();
            if !self.admit(&key)? {
                continue;
            }

            // The declared size comes from the archive and is not trusted
            let mut payload = Vec::new();
            file.read_to_end(&mut payload)
                .map_err(|e| UnitLoadError::ingestion(origin, e))?;
            trace!("{}: size={}, csize={}", key, payload.len(), file.compressed_size());

            let mut entry = ResourceEntry::new(key, payload, kind);
            if let Some(base) = &base {
                entry = entry.with_base_locator(base.clone());
            }
            if self.insert(entry)? {
                inserted += 1;
            }
        }

        debug!("Done loading {} ({} entries)", origin, inserted);
        Ok(inserted)
    }

    fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        let mut reader = self
            .fetcher()
            .open(url)
            .map_err(|cause| UnitLoadError::ingestion(url.as_str(), cause))?;
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| UnitLoadError::ingestion(url.as_str(), e))?;
        Ok(bytes)
    }
}

/// `jar:<archive>!/`, the prefix archive member keys are appended to.
fn archive_base(archive: &str) -> String {
    format!("jar:{}!/", archive)
}

fn join_prefix(prefix: &str, name: &str) -> String {
    match (prefix.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}/{}", prefix, name),
    }
}

/// `a/b/c` style package path of a relative directory.
fn package_of(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn file_locator(path: &Path) -> Result<Url> {
    let absolute = std::path::absolute(path)
        .map_err(|e| UnitLoadError::ingestion(path.display().to_string(), e))?;
    Url::from_file_path(&absolute)
        .map_err(|_| UnitLoadError::ingestion(path.display().to_string(), IngestionCause::InvalidLocator))
}

fn dir_locator(dir: &Path) -> Result<String> {
    let absolute = std::path::absolute(dir)
        .map_err(|e| UnitLoadError::ingestion(dir.display().to_string(), e))?;
    Url::from_directory_path(&absolute)
        .map(|url| url.to_string())
        .map_err(|_| UnitLoadError::ingestion(dir.display().to_string(), IngestionCause::InvalidLocator))
}

fn parent_dir_locator(path: &Path) -> Result<Option<String>> {
    let absolute = std::path::absolute(path)
        .map_err(|e| UnitLoadError::ingestion(path.display().to_string(), e))?;
    match absolute.parent() {
        Some(parent) => dir_locator(parent).map(Some),
        None => Ok(Some("file:///".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_parse() {
        assert_eq!(
            Root::parse("https://repo.example/lib/a.jar"),
            Root::Url(Url::parse("https://repo.example/lib/a.jar").unwrap())
        );
        assert_eq!(Root::parse("libs/a.jar"), Root::Path(PathBuf::from("libs/a.jar")));
        assert_eq!(Root::parse("C:\\libs\\a.jar"), Root::Path(PathBuf::from("C:\\libs\\a.jar")));
    }

    #[test]
    fn test_join_prefix() {
        assert_eq!(join_prefix("", "Foo.class"), "Foo.class");
        assert_eq!(join_prefix("com/acme", "Foo.class"), "com/acme/Foo.class");
        assert_eq!(join_prefix("com", ""), "com");
    }

    #[test]
    fn test_archive_base() {
        assert_eq!(
            archive_base("file:///libs/a.jar"),
            "jar:file:///libs/a.jar!/"
        );
    }
}

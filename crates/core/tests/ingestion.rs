//! Archive, directory and remote ingestion into the archive store.

mod common;

use common::{MemoryFetcher, jar_bytes, write_file, write_jar};
use std::io::{Cursor, Read, Write};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use unitload_core::error::IngestionCause;
use unitload_core::model::{EntryOrigin, ResourceType};
use unitload_core::store::{RemoteFetcher, StorePolicies};
use unitload_core::{ArchiveStore, CollisionPolicy, MissingPathPolicy, Root, UnitLoadError};
use url::Url;

fn store_with(collision: CollisionPolicy, missing_path: MissingPathPolicy) -> ArchiveStore {
    ArchiveStore::with_policies(StorePolicies {
        collision,
        missing_path,
    })
}

#[test]
fn test_archive_entries_and_locators() {
    let temp = TempDir::new().unwrap();
    let jar = write_jar(
        temp.path(),
        "app.jar",
        &[
            ("com/", b""),
            ("com/acme/", b""),
            ("com/acme/Widget.class", b"widget"),
            ("app.properties", b"k=v"),
        ],
    );

    let store = ArchiveStore::new();
    assert_eq!(store.load_archive_file(&jar).unwrap(), 2);
    assert_eq!(
        store.keys(),
        vec!["app.properties".to_string(), "com/acme/Widget.class".to_string()]
    );

    let entry = store.get("com/acme/Widget.class").unwrap();
    assert_eq!(entry.bytes(), b"widget");
    assert_eq!(entry.metadata().origin, EntryOrigin::Archive);
    assert_eq!(entry.metadata().size, 6);

    let jar_url = Url::from_file_path(std::path::absolute(&jar).unwrap()).unwrap();
    let locator = store.locator("com/acme/Widget.class").unwrap().unwrap();
    assert_eq!(
        locator.as_str(),
        format!("jar:{}!/com/acme/Widget.class", jar_url)
    );
}

#[test]
fn test_shared_key_keeps_first_archive() {
    let temp = TempDir::new().unwrap();
    let first = write_jar(temp.path(), "first.jar", &[("com/acme/Shared.class", b"first")]);
    let second = write_jar(
        temp.path(),
        "second.jar",
        &[("com/acme/Shared.class", b"second"), ("com/acme/Other.class", b"other")],
    );

    let store = ArchiveStore::new();
    store.load_archive_file(&first).unwrap();
    assert_eq!(store.load_archive_file(&second).unwrap(), 1);

    assert_eq!(&*store.payload("com/acme/Shared.class").unwrap(), b"first");
    assert!(store.contains("com/acme/Other.class"));
}

#[test]
fn test_shared_key_rejected() {
    let temp = TempDir::new().unwrap();
    let first = write_jar(temp.path(), "first.jar", &[("com/acme/Shared.class", b"first")]);
    let second = write_jar(temp.path(), "second.jar", &[("com/acme/Shared.class", b"second")]);

    let store = store_with(CollisionPolicy::Reject, MissingPathPolicy::Ignore);
    store.load_archive_file(&first).unwrap();

    match store.load_archive_file(&second) {
        Err(UnitLoadError::Collision { key }) => assert_eq!(key, "com/acme/Shared.class"),
        other => panic!("expected collision, got {:?}", other.map(|_| ())),
    }
    assert_eq!(&*store.payload("com/acme/Shared.class").unwrap(), b"first");

    // Re-ingesting the same archive under Reject fails too
    assert!(matches!(
        store.load_archive_file(&first),
        Err(UnitLoadError::Collision { .. })
    ));
}

#[test]
fn test_collision_policy_switch_at_runtime() {
    let store = ArchiveStore::new();
    store.add_resource("a.txt", b"one".to_vec()).unwrap();
    assert!(!store.add_resource("a.txt", b"two".to_vec()).unwrap());

    store.set_collision_policy(CollisionPolicy::Reject);
    assert!(matches!(
        store.add_resource("a.txt", b"three".to_vec()),
        Err(UnitLoadError::Collision { .. })
    ));
}

#[test]
fn test_directory_tree_keys() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("classes");
    write_file(&root, "pkg/Foo.class", b"foo");
    write_file(&root, "pkg/sub/Bar.class", b"bar");
    write_file(&root, "pkg/app.properties", b"k=v");
    write_file(&root, "Top.class", b"top");
    write_jar(&root, "lib.jar", &[("lib/Dep.class", b"dep")]);

    let store = ArchiveStore::new();
    assert_eq!(store.load_path(&root).unwrap(), 5);

    assert_eq!(
        store.keys(),
        vec![
            "Top.class".to_string(),
            // Plain resources are keyed by file name alone
            "app.properties".to_string(),
            "lib/Dep.class".to_string(),
            "pkg/Foo.class".to_string(),
            "pkg/sub/Bar.class".to_string(),
        ]
    );
    assert_eq!(store.get("pkg/Foo.class").unwrap().metadata().origin, EntryOrigin::Directory);

    let root_url = Url::from_directory_path(std::path::absolute(&root).unwrap()).unwrap();
    assert_eq!(
        store.locator("pkg/Foo.class").unwrap().unwrap(),
        root_url.join("pkg/Foo.class").unwrap()
    );
    assert_eq!(
        store.locator("app.properties").unwrap().unwrap(),
        root_url.join("pkg/app.properties").unwrap()
    );
}

#[test]
fn test_directory_tree_with_package_prefix() {
    let temp = TempDir::new().unwrap();
    let file = write_file(temp.path(), "Foo.class", b"foo");
    let props = write_file(temp.path(), "foo.properties", b"k=v");

    let store = ArchiveStore::new();
    store.load_directory_tree(&file, "com/acme").unwrap();
    store.load_directory_tree(&props, "com/acme").unwrap();

    assert!(store.contains("com/acme/Foo.class"));
    assert!(store.contains("foo.properties"));
    assert!(!store.contains("com/acme/foo.properties"));
}

#[test]
fn test_missing_path_policy() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nope");

    let store = ArchiveStore::new();
    assert_eq!(store.load_path(&missing).unwrap(), 0);
    assert!(store.is_empty());

    store.set_missing_path_policy(MissingPathPolicy::Fail);
    assert!(matches!(
        store.load_path(&missing),
        Err(UnitLoadError::Ingestion {
            cause: IngestionCause::MissingPath,
            ..
        })
    ));
}

#[test]
fn test_remote_archive_and_resource() {
    let jar_url = "https://repo.example.com/libs/remote.jar";
    let props_url = "https://repo.example.com/conf/app.properties";
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .with(jar_url, jar_bytes(&[("com/remote/Thing.class", b"thing")]))
            .with(props_url, b"k=v".to_vec()),
    );
    let store = ArchiveStore::with_fetcher(StorePolicies::default(), fetcher.clone());

    assert_eq!(store.load_url(&Url::parse(jar_url).unwrap()).unwrap(), 1);
    let entry = store.get("com/remote/Thing.class").unwrap();
    assert_eq!(entry.metadata().origin, EntryOrigin::Remote);
    assert_eq!(
        entry.locator().unwrap().as_str(),
        "jar:https://repo.example.com/libs/remote.jar!/com/remote/Thing.class"
    );

    assert_eq!(
        store
            .load_remote_resource(&Url::parse(props_url).unwrap())
            .unwrap(),
        1
    );
    assert_eq!(&*store.payload(props_url).unwrap(), b"k=v");
    assert!(matches!(
        store.locator(props_url),
        Err(UnitLoadError::NoLocator { .. })
    ));
    assert_eq!(fetcher.calls(), 2);
}

#[test]
fn test_remote_transport_failure() {
    let store = ArchiveStore::with_fetcher(StorePolicies::default(), Arc::new(MemoryFetcher::new()));
    let url = Url::parse("https://repo.example.com/missing.jar").unwrap();

    assert!(matches!(
        store.load_remote_resource(&url),
        Err(UnitLoadError::Ingestion {
            cause: IngestionCause::Transport(_),
            ..
        })
    ));
    assert!(store.is_empty());
}

#[test]
fn test_root_dispatch() {
    let temp = TempDir::new().unwrap();
    let jar = write_jar(temp.path(), "a.jar", &[("a/A.class", b"a")]);
    let file_url = Url::from_file_path(std::path::absolute(&jar).unwrap()).unwrap();

    let store = ArchiveStore::new();
    assert_eq!(store.load_root(&Root::Url(file_url)).unwrap(), 1);
    assert!(store.contains("a/A.class"));
}

#[test]
fn test_archive_stream_has_no_locator() {
    let store = ArchiveStore::new();
    let bytes = jar_bytes(&[("s/S.class", b"s")]);

    assert_eq!(store.load_archive_stream(None, bytes.as_slice()).unwrap(), 1);
    assert_eq!(store.get("s/S.class").unwrap().metadata().origin, EntryOrigin::Stream);
    assert!(matches!(
        store.locator("s/S.class"),
        Err(UnitLoadError::NoLocator { .. })
    ));
}

#[test]
fn test_corrupt_archive() {
    let temp = TempDir::new().unwrap();
    let path = write_file(temp.path(), "broken.jar", b"definitely not a zip");

    let store = ArchiveStore::new();
    assert!(matches!(
        store.load_archive_file(&path),
        Err(UnitLoadError::Ingestion {
            cause: IngestionCause::Archive(_),
            ..
        })
    ));
}

#[test]
fn test_unload_guesses_type() {
    let store = ArchiveStore::new();
    store.add_resource("conf/app.properties", b"k=v".to_vec()).unwrap();

    let removed = store.unload("conf/app.properties").unwrap();
    assert_eq!(removed.key(), "conf/app.properties");
    assert!(store.is_empty());

    for (key, expected) in [
        ("conf/app.properties", ResourceType::Properties),
        ("a/B.class", ResourceType::Unit),
        ("beans.xml", ResourceType::Xml),
        ("readme.txt", ResourceType::Unknown),
    ] {
        match store.unload(key) {
            Err(UnitLoadError::NotFound { name, kind }) => {
                assert_eq!(name, key);
                assert_eq!(kind, expected);
            }
            other => panic!("expected not found, got {:?}", other),
        }
    }
}

/// A one-entry jar whose zip64 headers claim a 64 TiB payload.
fn jar_with_forged_size() -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .large_file(true);
    zip.start_file("big.bin", options).unwrap();
    zip.write_all(b"small").unwrap();
    let mut bytes = zip.finish().unwrap().into_inner();

    // zip64 extended information: id 0x0001, length, then the uncompressed size
    let declared = 5u64.to_le_bytes();
    let forged = (1u64 << 46).to_le_bytes();
    let mut patched = 0;
    for i in 0..bytes.len().saturating_sub(12) {
        if bytes[i] == 0x01 && bytes[i + 1] == 0x00 && bytes[i + 3] == 0x00 && bytes[i + 4..i + 12] == declared {
            bytes[i + 4..i + 12].copy_from_slice(&forged);
            patched += 1;
        }
    }
    assert!(patched > 0);
    bytes
}

#[test]
fn test_forged_entry_size_is_not_trusted() {
    let store = ArchiveStore::new();

    match store.load_archive_stream(None, Cursor::new(jar_with_forged_size())) {
        Ok(_) => {
            if let Some(entry) = store.get("big.bin") {
                assert_eq!(entry.bytes(), b"small");
            }
        }
        Err(e) => assert!(matches!(e, UnitLoadError::Ingestion { .. }), "{:?}", e),
    }
}

/// Blocks inside `open` until released, announcing when it got there.
struct GatedFetcher {
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl RemoteFetcher for GatedFetcher {
    fn open(&self, _url: &Url) -> std::result::Result<Box<dyn Read + Send>, IngestionCause> {
        let _ = self.entered.lock().unwrap().send(());
        let _ = self.release.lock().unwrap().recv();
        Ok(Box::new(Cursor::new(b"remote=1".to_vec())))
    }
}

#[test]
fn test_ingestion_is_single_writer() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let fetcher = GatedFetcher {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    };
    let store = Arc::new(ArchiveStore::with_fetcher(StorePolicies::default(), Arc::new(fetcher)));

    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "local.properties", b"local=1");

    let remote = {
        let store = Arc::clone(&store);
        let url = Url::parse("https://repo.example.com/conf/remote.properties").unwrap();
        thread::spawn(move || store.load_remote_resource(&url))
    };
    entered_rx.recv().unwrap();

    let (done_tx, done_rx) = mpsc::channel();
    let writers = {
        let store = Arc::clone(&store);
        let dir = temp.path().to_path_buf();
        thread::spawn(move || {
            let added = store.add_resource("manual.properties", b"manual=1".to_vec());
            let loaded = store.load_path(&dir);
            done_tx.send(()).unwrap();
            (added, loaded)
        })
    };

    // Both writers wait on the remote ingestion still holding the lock
    assert!(done_rx.recv_timeout(Duration::from_millis(200)).is_err());
    assert!(!store.contains("manual.properties"));
    assert!(!store.contains("local.properties"));

    release_tx.send(()).unwrap();
    assert_eq!(remote.join().unwrap().unwrap(), 1);
    let (added, loaded) = writers.join().unwrap();
    assert!(added.unwrap());
    assert_eq!(loaded.unwrap(), 1);

    assert!(store.contains("https://repo.example.com/conf/remote.properties"));
    assert!(store.contains("manual.properties"));
    assert!(store.contains("local.properties"));
}

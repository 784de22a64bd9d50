//! End-to-end directory operations against the in-memory store

use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use dirsync_core::{
    ChannelSink, DirectorySync, Error, MemoryStore, Operation, PrefixMatch, SyncEvent,
    SyncOptions,
};
use tempfile::TempDir;

const TEST_FILES: &[&str] = &[
    "File1.txt",
    "File2.txt",
    "File3.txt",
    "Folder/File4.txt",
    "Folder/File5.txt",
    "Folder/Subfolder/File6.txt",
    "AnotherFolder/File7.txt",
];

fn create_test_files(root: &Path) {
    for file in TEST_FILES {
        let path = file.split('/').fold(root.to_path_buf(), |p, s| p.join(s));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, format!("I am a testfile named '{file}'.")).unwrap();
    }
}

fn setup() -> (TempDir, Arc<MemoryStore>) {
    let temp_dir = TempDir::new().unwrap();
    create_test_files(temp_dir.path());
    (temp_dir, Arc::new(MemoryStore::new("test-container")))
}

fn sorted(mut keys: Vec<String>) -> Vec<String> {
    keys.sort_unstable();
    keys
}

fn archive_names<R: Read + std::io::Seek>(reader: R) -> Vec<String> {
    let archive = zip::ZipArchive::new(reader).unwrap();
    sorted(archive.file_names().map(str::to_string).collect())
}

#[tokio::test]
async fn test_upload_to_root() {
    let (temp_dir, store) = setup();
    let sync = DirectorySync::new(Arc::clone(&store));

    let report = sync.upload_directory(temp_dir.path(), None).await.unwrap();

    assert_eq!(report.operation, Operation::Upload);
    assert_eq!(report.transferred(), TEST_FILES.len());
    assert!(report.is_complete());
    assert_eq!(store.keys(), sorted(TEST_FILES.iter().map(|f| f.to_string()).collect()));
    assert_eq!(
        store.data("Folder/Subfolder/File6.txt").unwrap(),
        b"I am a testfile named 'Folder/Subfolder/File6.txt'."
    );
}

#[tokio::test]
async fn test_upload_to_prefix() {
    let (temp_dir, store) = setup();
    let sync = DirectorySync::new(Arc::clone(&store));

    sync.upload_directory(temp_dir.path(), Some("my")).await.unwrap();

    let expected = sorted(TEST_FILES.iter().map(|f| format!("my/{f}")).collect());
    assert_eq!(store.keys(), expected);
}

#[tokio::test]
async fn test_upload_is_idempotent() {
    let (temp_dir, store) = setup();
    let sync = DirectorySync::new(Arc::clone(&store));

    sync.upload_directory(temp_dir.path(), None).await.unwrap();
    let second = sync.upload_directory(temp_dir.path(), None).await.unwrap();

    assert_eq!(second.transferred(), 0);
    assert_eq!(second.skipped(), TEST_FILES.len());
    assert_eq!(store.keys().len(), TEST_FILES.len());
}

#[tokio::test]
async fn test_upload_does_not_overwrite() {
    let (temp_dir, store) = setup();
    store.insert("File1.txt", "remote version");
    let sync = DirectorySync::new(Arc::clone(&store));

    let report = sync.upload_directory(temp_dir.path(), None).await.unwrap();

    assert_eq!(report.skipped(), 1);
    assert_eq!(store.data("File1.txt").unwrap(), b"remote version");
}

#[tokio::test]
async fn test_upload_missing_container() {
    let (temp_dir, _) = setup();
    let store = Arc::new(MemoryStore::missing("gone"));
    let sync = DirectorySync::new(Arc::clone(&store));

    let result = sync.upload_directory(temp_dir.path(), None).await;

    assert!(matches!(result, Err(Error::ContainerNotFound(_))));
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn test_delete_everything() {
    let (temp_dir, store) = setup();
    let sync = DirectorySync::new(Arc::clone(&store));
    sync.upload_directory(temp_dir.path(), None).await.unwrap();

    let report = sync.delete_all(None).await.unwrap();

    assert_eq!(report.deleted(), TEST_FILES.len());
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn test_delete_prefix_only() {
    let (temp_dir, store) = setup();
    let sync = DirectorySync::new(Arc::clone(&store));
    sync.upload_directory(temp_dir.path(), None).await.unwrap();

    let report = sync.delete_all(Some("Folder")).await.unwrap();

    assert_eq!(report.deleted(), 3);
    assert_eq!(
        store.keys(),
        vec![
            "AnotherFolder/File7.txt",
            "File1.txt",
            "File2.txt",
            "File3.txt"
        ]
    );
}

#[tokio::test]
async fn test_delete_empty_container() {
    let store = Arc::new(MemoryStore::new("empty"));
    let sync = DirectorySync::new(Arc::clone(&store));

    let report = sync.delete_all(None).await.unwrap();
    assert!(report.items.is_empty());
}

#[tokio::test]
async fn test_delete_raw_prefix_matches_sibling() {
    let store = Arc::new(MemoryStore::new("test"));
    store.insert("Folder/a.txt", "a");
    store.insert("FolderX/b.txt", "b");
    store.insert("Other/c.txt", "c");

    let sync = DirectorySync::new(Arc::clone(&store));
    sync.delete_all(Some("Folder")).await.unwrap();

    assert_eq!(store.keys(), vec!["Other/c.txt"]);
}

#[tokio::test]
async fn test_delete_segment_prefix_keeps_sibling() {
    let store = Arc::new(MemoryStore::new("test"));
    store.insert("Folder/a.txt", "a");
    store.insert("FolderX/b.txt", "b");

    let sync = DirectorySync::new(Arc::clone(&store))
        .with_options(SyncOptions::new().with_prefix_match(PrefixMatch::Segment));
    sync.delete_all(Some("Folder")).await.unwrap();

    assert_eq!(store.keys(), vec!["FolderX/b.txt"]);
}

#[tokio::test]
async fn test_delete_trailing_separator_keeps_sibling() {
    let store = Arc::new(MemoryStore::new("test"));
    store.insert("Folder/a.txt", "a");
    store.insert("Folder/Sub/c.txt", "c");
    store.insert("FolderX/b.txt", "b");

    let sync = DirectorySync::new(Arc::clone(&store));
    let report = sync.delete_all(Some("Folder/")).await.unwrap();

    assert_eq!(report.deleted(), 2);
    assert_eq!(store.keys(), vec!["FolderX/b.txt"]);
}

#[tokio::test]
async fn test_delete_failure_aborts_by_default() {
    let store = Arc::new(MemoryStore::new("test"));
    store.insert("a.txt", "a");
    store.insert("b.txt", "b");
    store.fail_deletes("a.txt");

    let sync = DirectorySync::new(Arc::clone(&store));
    let result = sync.delete_all(None).await;

    assert!(matches!(result, Err(Error::Network(_))));
    assert!(store.contains("a.txt"));
}

#[tokio::test]
async fn test_download_recreates_structure() {
    let (temp_dir, store) = setup();
    let sync = DirectorySync::new(Arc::clone(&store));
    sync.upload_directory(temp_dir.path(), None).await.unwrap();

    let target = TempDir::new().unwrap();
    let report = sync.download_to_directory(target.path(), None).await.unwrap();

    assert_eq!(report.transferred(), TEST_FILES.len());
    let file6 = target.path().join("Folder").join("Subfolder").join("File6.txt");
    assert_eq!(
        std::fs::read_to_string(file6).unwrap(),
        "I am a testfile named 'Folder/Subfolder/File6.txt'."
    );
}

#[tokio::test]
async fn test_download_prefix_strips_prefix() {
    let (temp_dir, store) = setup();
    let sync = DirectorySync::new(Arc::clone(&store));
    sync.upload_directory(temp_dir.path(), Some("my")).await.unwrap();

    let target = TempDir::new().unwrap();
    let out = target.path().join("restore");
    let report = sync.download_to_directory(&out, Some("my/Folder")).await.unwrap();

    assert_eq!(report.transferred(), 3);
    assert!(out.join("File4.txt").is_file());
    assert!(out.join("Subfolder").join("File6.txt").is_file());
    assert!(!out.join("my").exists());
}

#[tokio::test]
async fn test_download_trailing_separator_strips_prefix() {
    let store = Arc::new(MemoryStore::new("test"));
    store.insert("Folder/b.txt", "b");
    store.insert("Folder/Sub/c.txt", "c");
    store.insert("FolderX/d.txt", "d");

    let target = TempDir::new().unwrap();
    let sync = DirectorySync::new(Arc::clone(&store));
    let report = sync
        .download_to_directory(target.path(), Some("Folder/"))
        .await
        .unwrap();

    assert_eq!(report.transferred(), 2);
    assert_eq!(std::fs::read_to_string(target.path().join("b.txt")).unwrap(), "b");
    assert!(target.path().join("Sub").join("c.txt").is_file());
    assert!(!target.path().join("d.txt").exists());
}

#[tokio::test]
async fn test_download_partial_failure_is_isolated() {
    let (temp_dir, store) = setup();
    let sync = DirectorySync::new(Arc::clone(&store));
    sync.upload_directory(temp_dir.path(), None).await.unwrap();
    store.fail_reads("File2.txt");

    let target = TempDir::new().unwrap();
    let report = sync.download_to_directory(target.path(), None).await.unwrap();

    assert_eq!(report.failed(), 1);
    assert_eq!(report.transferred(), TEST_FILES.len() - 1);
    assert_eq!(report.failures().next().unwrap().source, "File2.txt");
    assert!(!target.path().join("File2.txt").exists());
    assert!(target.path().join("File3.txt").exists());
}

#[tokio::test]
async fn test_download_missing_container() {
    let sync = DirectorySync::new(MemoryStore::missing("gone"));
    let target = TempDir::new().unwrap();
    let out = target.path().join("never");

    let result = sync.download_to_directory(&out, None).await;

    assert!(matches!(result, Err(Error::ContainerNotFound(name)) if name == "gone"));
    assert!(!out.exists());
}

#[tokio::test]
async fn test_archive_contains_every_object() {
    let store = Arc::new(MemoryStore::new("test"));
    store.insert("a.txt", "a");
    store.insert("Folder/b.txt", "b");

    let sync = DirectorySync::new(Arc::clone(&store));
    let (cursor, report) = sync
        .download_to_archive(Cursor::new(Vec::new()), None)
        .await
        .unwrap();

    assert_eq!(report.operation, Operation::Archive);
    assert_eq!(archive_names(cursor), vec!["Folder/b.txt", "a.txt"]);
}

#[tokio::test]
async fn test_archive_with_prefix() {
    let store = Arc::new(MemoryStore::new("test"));
    store.insert("a.txt", "a");
    store.insert("Folder/b.txt", "b");

    let sync = DirectorySync::new(Arc::clone(&store));
    let (cursor, _) = sync
        .download_to_archive(Cursor::new(Vec::new()), Some("Folder"))
        .await
        .unwrap();

    assert_eq!(archive_names(cursor), vec!["b.txt"]);
}

#[tokio::test]
async fn test_archive_file_roundtrip() {
    let (temp_dir, store) = setup();
    let sync = DirectorySync::new(Arc::clone(&store));
    sync.upload_directory(temp_dir.path(), None).await.unwrap();

    let out = TempDir::new().unwrap();
    let path = out.path().join("ZipDownload").join("all.zip");
    let report = sync.download_to_archive_file(&path, None).await.unwrap();

    assert_eq!(report.transferred(), TEST_FILES.len());
    let file = std::fs::File::open(&path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut content = String::new();
    archive
        .by_name("Folder/Subfolder/File6.txt")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "I am a testfile named 'Folder/Subfolder/File6.txt'.");
}

#[tokio::test]
async fn test_archive_failed_entry_is_reported() {
    let store = Arc::new(MemoryStore::new("test"));
    store.insert("a.txt", "a");
    store.insert("b.txt", "b");
    store.fail_reads("a.txt");

    let sync = DirectorySync::new(Arc::clone(&store));
    let (cursor, report) = sync
        .download_to_archive(Cursor::new(Vec::new()), None)
        .await
        .unwrap();

    assert_eq!(report.failed(), 1);
    assert_eq!(report.transferred(), 1);
    // the entry was started before the read failed
    assert_eq!(archive_names(cursor), vec!["a.txt", "b.txt"]);
}

#[tokio::test]
async fn test_concurrent_transfers_match_sequential() {
    let (temp_dir, store) = setup();
    let sync = DirectorySync::new(Arc::clone(&store))
        .with_options(SyncOptions::new().with_concurrency(4).with_page_size(2));

    let report = sync.upload_directory(temp_dir.path(), None).await.unwrap();
    assert_eq!(report.transferred(), TEST_FILES.len());

    let target = TempDir::new().unwrap();
    let report = sync.download_to_directory(target.path(), None).await.unwrap();
    assert_eq!(report.transferred(), TEST_FILES.len());
    assert!(target.path().join("AnotherFolder").join("File7.txt").is_file());

    let report = sync.delete_all(None).await.unwrap();
    assert_eq!(report.deleted(), TEST_FILES.len());
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn test_channel_sink_receives_events() {
    let (temp_dir, store) = setup();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let sync = DirectorySync::new(Arc::clone(&store)).with_sink(ChannelSink::new(tx));

    sync.upload_directory(temp_dir.path(), None).await.unwrap();
    sync.upload_directory(temp_dir.path(), None).await.unwrap();

    let mut transferred = 0;
    let mut skipped = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            SyncEvent::ItemTransferred { .. } => transferred += 1,
            SyncEvent::ItemSkipped { .. } => skipped += 1,
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(transferred, TEST_FILES.len());
    assert_eq!(skipped, TEST_FILES.len());
}

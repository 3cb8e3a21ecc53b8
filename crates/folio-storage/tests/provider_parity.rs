//! Local and cloud providers driven through the same trait object must agree
//! on every file operation.

use std::sync::Arc;

use folio_storage::{
    CloudStorageProvider, ListOptions, LocalStorageProvider, MemoryBlobStore, PendingLedger,
    S3ContentStore, StorageError, StorageProvider,
};
use folio_types::{EntryKind, ProjectId, UserId};
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("folio_storage=debug")
        .with_test_writer()
        .try_init();
}

/// Both providers, labelled. The temp dir must outlive the local provider.
fn providers() -> (TempDir, Vec<(&'static str, Arc<dyn StorageProvider>)>) {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let local: Arc<dyn StorageProvider> = Arc::new(LocalStorageProvider::new(dir.path()));
    let cloud: Arc<dyn StorageProvider> = Arc::new(CloudStorageProvider::new(
        Arc::new(S3ContentStore::new(Arc::new(MemoryBlobStore::new()))),
        Arc::new(PendingLedger::in_memory().unwrap()),
        ProjectId::new(),
        UserId::new(),
    ));
    (dir, vec![("local", local), ("cloud", cloud)])
}

fn listing(entries: &[folio_types::FileEntry]) -> Vec<(String, EntryKind)> {
    entries.iter().map(|e| (e.path.clone(), e.kind)).collect()
}

#[tokio::test]
async fn test_read_your_writes() {
    let (_dir, providers) = providers();
    for (label, provider) in providers {
        provider.write_file("/docs/intro.md", "# Intro\n").await.unwrap();
        assert_eq!(
            provider.read_file("/docs/intro.md").await.unwrap(),
            "# Intro\n",
            "{label}"
        );
        provider.write_file("/docs/intro.md", "# Intro v2\n").await.unwrap();
        assert_eq!(
            provider.read_file("/docs/intro.md").await.unwrap(),
            "# Intro v2\n",
            "{label}"
        );
    }
}

#[tokio::test]
async fn test_listings_agree() {
    let (_dir, providers) = providers();
    let mut listings = Vec::new();
    for (_, provider) in &providers {
        provider.write_file("/b.md", "b").await.unwrap();
        provider.write_file("/a.md", "a").await.unwrap();
        provider.write_file("/notes.txt", "n").await.unwrap();
        provider.write_file("/.hidden.md", "h").await.unwrap();
        provider.write_file("/guides/setup.md", "s").await.unwrap();

        let all = provider
            .list_directory("/", &ListOptions::default())
            .await
            .unwrap();
        let md = provider
            .list_directory("/", &ListOptions::default().with_extensions(["md"]))
            .await
            .unwrap();
        let nested = provider
            .list_directory("/guides", &ListOptions::default())
            .await
            .unwrap();
        listings.push((listing(&all), listing(&md), listing(&nested)));
    }

    let (all, md, nested) = &listings[0];
    assert_eq!(
        all,
        &vec![
            ("/guides".to_string(), EntryKind::Directory),
            ("/a.md".to_string(), EntryKind::File),
            ("/b.md".to_string(), EntryKind::File),
            ("/notes.txt".to_string(), EntryKind::File),
        ]
    );
    assert_eq!(md.len(), 3);
    assert_eq!(nested, &vec![("/guides/setup.md".to_string(), EntryKind::File)]);
    assert_eq!(listings[0], listings[1]);
}

#[tokio::test]
async fn test_exists_delete_rename() {
    let (_dir, providers) = providers();
    for (label, provider) in providers {
        provider.write_file("/dir/one.md", "1").await.unwrap();
        provider.write_file("/dir/two.md", "2").await.unwrap();
        assert!(provider.exists("/").await.unwrap(), "{label}");
        assert!(provider.exists("/dir").await.unwrap(), "{label}");
        assert!(!provider.exists("/nope.md").await.unwrap(), "{label}");

        provider.rename("/dir/one.md", "/moved/one.md").await.unwrap();
        assert!(!provider.exists("/dir/one.md").await.unwrap(), "{label}");
        assert_eq!(provider.read_file("/moved/one.md").await.unwrap(), "1", "{label}");

        provider.delete_file("/dir").await.unwrap();
        assert!(!provider.exists("/dir/two.md").await.unwrap(), "{label}");

        let err = provider.delete_file("/dir/two.md").await.unwrap_err();
        assert!(err.is_not_found(), "{label}: {err}");
    }
}

#[tokio::test]
async fn test_errors_agree() {
    let (_dir, providers) = providers();
    for (label, provider) in providers {
        provider.write_file("/image.png", "not really").await.unwrap();

        let err = provider.read_file("/missing.md").await.unwrap_err();
        assert!(err.is_not_found(), "{label}: {err}");

        let err = provider.read_file("/image.png").await.unwrap_err();
        assert!(matches!(err, StorageError::BinaryFile(_)), "{label}: {err}");

        let err = provider.read_file("/../etc/passwd.md").await.unwrap_err();
        assert!(matches!(err, StorageError::PathTraversal(_)), "{label}: {err}");

        let err = provider.write_file("/a/../../b.md", "x").await.unwrap_err();
        assert!(matches!(err, StorageError::PathTraversal(_)), "{label}: {err}");

        assert_eq!(err.kind(), "path_traversal", "{label}");
    }
}

#[tokio::test]
async fn test_rename_onto_itself_is_a_no_op() {
    let (_dir, providers) = providers();
    for (label, provider) in providers {
        provider.write_file("/same.md", "body").await.unwrap();
        provider.write_file("/dir/inner.md", "inner").await.unwrap();

        provider.rename("/same.md", "/same.md").await.unwrap();
        assert!(provider.exists("/same.md").await.unwrap(), "{label}");
        assert_eq!(provider.read_file("/same.md").await.unwrap(), "body", "{label}");

        provider.rename("/dir", "/dir").await.unwrap();
        assert_eq!(
            provider.read_file("/dir/inner.md").await.unwrap(),
            "inner",
            "{label}"
        );

        let err = provider.rename("/dir", "/dir/sub").await.unwrap_err();
        assert_eq!(err.kind(), "invalid_input", "{label}");
        assert!(provider.exists("/dir/inner.md").await.unwrap(), "{label}");
    }
}

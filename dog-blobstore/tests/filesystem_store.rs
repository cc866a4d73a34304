use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tempfile::TempDir;

use dog_blobstore::input::chunked;
use dog_blobstore::{
    BlobError, BlobInput, BlobPath, BlobStore, ContentType, DigestAlgorithm, FileSystemBlobStore,
    FileSystemStoreConfig, FixedClock,
};

const TEST_DATA: &str = "Lorem ipsum dolor sit amet";

/// Test factory functions
fn fixed_instant() -> DateTime<Utc> {
    "2019-03-19T15:36:04.295Z".parse().unwrap()
}

fn text_plain_utf8() -> ContentType {
    ContentType::parse("text/plain;charset=UTF-8").unwrap()
}

fn blob_input() -> BlobInput {
    BlobInput::with_content_type(
        chunked(vec![Bytes::from_static(TEST_DATA.as_bytes())]),
        Some(TEST_DATA.len() as u64),
        text_plain_utf8(),
    )
}

fn foo_bar() -> BlobPath {
    BlobPath::new("foo/bar").unwrap()
}

async fn create_store() -> (TempDir, FileSystemBlobStore) {
    let dir = tempfile::tempdir().unwrap();
    let config = FileSystemStoreConfig::new(dir.path()).with_buffer_size(512);
    let store = FileSystemBlobStore::open(config)
        .await
        .unwrap()
        .with_clock(FixedClock(fixed_instant()));
    (dir, store)
}

fn read_text(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn test_store_creates_blob_file() {
    let (dir, store) = create_store().await;

    store.store(&foo_bar(), blob_input(), false).await.unwrap();

    let file = dir.path().join("foo").join("bar");
    assert!(file.is_file());
    assert_eq!(read_text(&file), TEST_DATA);
    assert!(dir.path().join("foo").join("bar.metadata").is_file());
}

#[tokio::test]
async fn test_retrieve_metadata_of_stored_blob() {
    let (_dir, store) = create_store().await;

    store.store(&foo_bar(), blob_input(), false).await.unwrap();
    let metadata = store.get_metadata(&foo_bar()).await.unwrap();

    assert_eq!(metadata.path, foo_bar());
    assert_eq!(metadata.content_type, text_plain_utf8());
    assert_eq!(metadata.size, TEST_DATA.len() as u64);
    assert_eq!(
        metadata.etag.as_deref(),
        Some(DigestAlgorithm::Sha256.etag_of(TEST_DATA.as_bytes()).as_str())
    );
    assert_eq!(metadata.last_modified, Some(fixed_instant()));
    assert_eq!(metadata.store_id(), store.store_id());
}

#[tokio::test]
async fn test_retrieve_contents_of_stored_blob() {
    let (_dir, store) = create_store().await;

    store.store(&foo_bar(), blob_input(), false).await.unwrap();
    let metadata = store.get_metadata(&foo_bar()).await.unwrap();
    let blob = store.retrieve(&metadata).await.unwrap();

    assert_eq!(blob.content_type(), &text_plain_utf8());
    assert_eq!(blob.size(), TEST_DATA.len() as u64);
    assert!(blob.etag().is_some());
    assert_eq!(blob.last_modified(), Some(fixed_instant()));
    assert_eq!(blob.bytes().await.unwrap(), Bytes::from_static(TEST_DATA.as_bytes()));
}

#[tokio::test]
async fn test_delete_stored_blob() {
    let (dir, store) = create_store().await;

    store.store(&foo_bar(), blob_input(), false).await.unwrap();
    store.delete(&foo_bar()).await.unwrap();

    assert!(!dir.path().join("foo").join("bar").exists());
    assert!(!dir.path().join("foo").join("bar.metadata").exists());
    assert!(matches!(
        store.get_metadata(&foo_bar()).await,
        Err(BlobError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_overwrite_replaces_content_and_metadata() {
    let (dir, store) = create_store().await;

    store.store(&foo_bar(), blob_input(), false).await.unwrap();
    let replacement = BlobInput::from_bytes("second", Some(ContentType::parse("text/csv").unwrap()));
    store.store(&foo_bar(), replacement, false).await.unwrap();

    assert_eq!(read_text(&dir.path().join("foo").join("bar")), "second");
    let metadata = store.get_metadata(&foo_bar()).await.unwrap();
    assert_eq!(metadata.content_type.essence(), "text/csv");
    assert_eq!(metadata.size, 6);
}

#[tokio::test]
async fn test_fail_if_exists_keeps_existing_blob() {
    let (dir, store) = create_store().await;

    store.store(&foo_bar(), blob_input(), true).await.unwrap();
    let err = store
        .store(&foo_bar(), BlobInput::from_bytes("other", None), true)
        .await
        .unwrap_err();

    assert!(matches!(err, BlobError::AlreadyExists { .. }));
    assert_eq!(read_text(&dir.path().join("foo").join("bar")), TEST_DATA);
}

#[tokio::test]
async fn test_size_mismatch_leaves_no_blob() {
    let (dir, store) = create_store().await;

    let input = BlobInput::with_content_type(
        chunked(vec![Bytes::from_static(b"short")]),
        Some(100),
        ContentType::text_plain(),
    );
    let err = store.store(&foo_bar(), input, false).await.unwrap_err();

    assert!(matches!(err, BlobError::Invalid { .. }));
    assert!(!dir.path().join("foo").join("bar").exists());
    assert!(!dir.path().join("foo").join("bar.metadata").exists());
}

#[tokio::test]
async fn test_stream_error_leaves_no_blob() {
    let (dir, store) = create_store().await;

    let failing = futures_util::stream::iter(vec![
        Ok(Bytes::from_static(b"partial")),
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "producer went away")),
    ]);
    let input = BlobInput::new(Box::pin(failing) as dog_blobstore::ByteStream, None);

    let err = store.store(&foo_bar(), input, false).await.unwrap_err();
    assert!(matches!(err, BlobError::Io { .. }));
    assert!(!dir.path().join("foo").join("bar").exists());
}

#[tokio::test]
async fn test_wildcard_content_type_is_rejected() {
    let (_dir, store) = create_store().await;

    let input = BlobInput::create(chunked(vec![Bytes::from_static(b"x")]), Some(1), "text/*").unwrap();
    let err = store.store(&foo_bar(), input, false).await.unwrap_err();

    assert!(matches!(err, BlobError::Invalid { .. }));
}

#[tokio::test]
async fn test_delete_missing_blob() {
    let (_dir, store) = create_store().await;

    assert!(matches!(
        store.delete(&foo_bar()).await,
        Err(BlobError::NotFound { .. })
    ));
    assert!(!store.delete_if_exists(&foo_bar()).await.unwrap());
}

#[tokio::test]
async fn test_retrieved_stream_fails_after_concurrent_delete() {
    let (_dir, store) = create_store().await;

    store.store(&foo_bar(), blob_input(), false).await.unwrap();
    let metadata = store.get_metadata(&foo_bar()).await.unwrap();
    let blob = store.retrieve(&metadata).await.unwrap();
    store.delete(&foo_bar()).await.unwrap();

    assert!(blob.bytes().await.is_err());
}

#[tokio::test]
async fn test_metadata_persists_across_instances() {
    let (dir, store) = create_store().await;
    store.store(&foo_bar(), blob_input(), false).await.unwrap();
    let original = store.get_metadata(&foo_bar()).await.unwrap();

    let reopened = FileSystemBlobStore::open(FileSystemStoreConfig::new(dir.path()))
        .await
        .unwrap();
    let metadata = reopened.get_metadata(&foo_bar()).await.unwrap();

    assert_eq!(metadata.etag, original.etag);
    assert_eq!(metadata.content_type, original.content_type);
    assert_eq!(metadata.last_modified, original.last_modified);

    // Metadata from the first instance is not accepted by the second
    assert!(matches!(
        reopened.retrieve(&original).await,
        Err(BlobError::Invalid { .. })
    ));
}

#[tokio::test]
async fn test_sha1_etag() {
    let dir = tempfile::tempdir().unwrap();
    let config = FileSystemStoreConfig::new(dir.path()).with_digest_algorithm(DigestAlgorithm::Sha1);
    let store = FileSystemBlobStore::open(config).await.unwrap();

    store.store(&foo_bar(), blob_input(), false).await.unwrap();
    let metadata = store.get_metadata(&foo_bar()).await.unwrap();

    assert_eq!(
        metadata.etag,
        Some(DigestAlgorithm::Sha1.etag_of(TEST_DATA.as_bytes()))
    );
}

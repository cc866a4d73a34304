//! Blob store backed by a local directory.
//!
//! Layout under the base path:
//!
//! ```text
//! <base>/<blob path>            blob data
//! <base>/<blob path>.metadata   JSON sidecar: content type, etag, last modified
//! <base>/.tmp/                  staging area for in-flight writes
//! ```
//!
//! Commits and deletes hold a store-wide lock so the data file and its sidecar
//! always change together. The lock is per `FileSystemBlobStore` instance; two
//! instances over the same directory are not coordinated.

mod config;
mod sidecar;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::StreamExt;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

pub use config::FileSystemStoreConfig;

use crate::path::{METADATA_SUFFIX, STAGING_DIR};
use crate::store::{ensure_concrete_content_type, ensure_declared_size};
use crate::{
    Blob, BlobError, BlobInput, BlobMetadata, BlobPath, BlobResult, BlobStore, ByteStream, Clock,
    DigestAlgorithm, StoreId, SystemClock,
};
use sidecar::{sidecar_path, Sidecar};

/// Blob store that keeps each blob as a file plus a metadata sidecar
pub struct FileSystemBlobStore {
    id: StoreId,
    base_path: PathBuf,
    staging_dir: PathBuf,
    digest: DigestAlgorithm,
    buffer_size: usize,
    clock: Arc<dyn Clock>,
    /// Held for writing while data and sidecar are moved or removed
    commit_lock: RwLock<()>,
}

/// Staging file pair for one `store` call
struct Staged {
    data: PathBuf,
    metadata: PathBuf,
}

impl Staged {
    fn new(staging_dir: &Path) -> Self {
        let data = staging_dir.join(format!("blob-{}", Uuid::new_v4().simple()));
        let metadata = sidecar_path(&data);
        Self { data, metadata }
    }
}

impl Drop for Staged {
    // Runs on every outcome, including a dropped `store` future
    fn drop(&mut self) {
        for file in [&self.data, &self.metadata] {
            match std::fs::remove_file(file) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(file = %file.display(), error = %e, "failed to remove staged file"),
            }
        }
    }
}

impl FileSystemBlobStore {
    /// Open a store, creating the base and staging directories if needed
    pub async fn open(config: FileSystemStoreConfig) -> BlobResult<Self> {
        config.validate()?;

        let staging_dir = config.base_path.join(STAGING_DIR);
        fs::create_dir_all(&staging_dir).await?;

        debug!(base_path = %config.base_path.display(), "opened filesystem blob store");

        Ok(Self {
            id: StoreId::new(),
            base_path: config.base_path,
            staging_dir,
            digest: config.digest_algorithm,
            buffer_size: config.buffer_size,
            clock: Arc::new(SystemClock),
            commit_lock: RwLock::new(()),
        })
    }

    /// Use a custom clock for last-modified timestamps
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        self.digest
    }

    fn resolve(&self, path: &BlobPath) -> PathBuf {
        self.base_path.join(path.to_relative_path_buf())
    }

    /// Stream the input into the staging data file, returning its etag
    async fn write_data(&self, input: BlobInput, staged: &Staged) -> BlobResult<(String, Sidecar)> {
        let (mut data, size, content_type) = input.into_parts();

        let mut file = fs::File::create(&staged.data).await?;
        let mut digester = self.digest.digester();
        let mut written: u64 = 0;

        while let Some(chunk) = data.next().await {
            let chunk = chunk?;
            digester.update(&chunk);
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        ensure_declared_size(size, written)?;

        let etag = digester.finish_etag();
        let sidecar = Sidecar {
            content_type,
            etag: etag.clone(),
            last_modified: self.clock.now(),
        };
        Ok((etag, sidecar))
    }

    /// Move staged files into place; caller holds the commit lock
    async fn commit(
        &self,
        path: &BlobPath,
        staged: &Staged,
        target: &Path,
        fail_if_exists: bool,
    ) -> BlobResult<()> {
        let target_sidecar = sidecar_path(target);

        if fail_if_exists {
            // Linking fails if the target exists, so concurrent writers cannot both win
            match fs::hard_link(&staged.data, target).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    return Err(BlobError::already_exists(path.as_str()))
                }
                Err(e) => return Err(e.into()),
            }
            if let Err(e) = fs::rename(&staged.metadata, &target_sidecar).await {
                remove_quietly(target).await;
                return Err(e.into());
            }
        } else {
            fs::rename(&staged.metadata, &target_sidecar).await?;
            if let Err(e) = fs::rename(&staged.data, target).await {
                remove_quietly(target).await;
                remove_quietly(&target_sidecar).await;
                return Err(e.into());
            }
        }

        Ok(())
    }
}

#[async_trait]
impl BlobStore for FileSystemBlobStore {
    fn store_id(&self) -> StoreId {
        self.id
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn get_metadata(&self, path: &BlobPath) -> BlobResult<BlobMetadata> {
        let target = self.resolve(path);
        let _guard = self.commit_lock.read().await;

        let file_meta = match fs::metadata(&target).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(BlobError::not_found(path.as_str())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BlobError::not_found(path.as_str()))
            }
            Err(e) => return Err(e.into()),
        };

        let sidecar = Sidecar::read(&sidecar_path(&target), path).await?;

        Ok(
            BlobMetadata::new(self.id, path.clone(), file_meta.len(), sidecar.content_type)
                .with_etag(sidecar.etag)
                .with_last_modified(sidecar.last_modified),
        )
    }

    #[instrument(skip(self, metadata), fields(path = %metadata.path))]
    async fn retrieve(&self, metadata: &BlobMetadata) -> BlobResult<Blob> {
        if metadata.store_id() != self.id {
            return Err(BlobError::invalid(
                "This BlobMetadata was created by a different BlobStore",
            ));
        }

        let data = read_file(self.resolve(&metadata.path), self.buffer_size);
        Ok(Blob::new(metadata.clone(), data))
    }

    #[instrument(skip(self, input), fields(path = %path, size = ?input.size()))]
    async fn store(&self, path: &BlobPath, input: BlobInput, fail_if_exists: bool) -> BlobResult<()> {
        ensure_concrete_content_type(&input)?;

        let target = self.resolve(path);
        match fs::metadata(&target).await {
            Ok(meta) if meta.is_dir() => {
                return Err(BlobError::invalid(format!(
                    "Cannot store blob {}: a directory exists at that path",
                    path
                )))
            }
            Ok(_) if fail_if_exists => return Err(BlobError::already_exists(path.as_str())),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let staged = Staged::new(&self.staging_dir);
        let (etag, sidecar) = self.write_data(input, &staged).await?;
        sidecar.write(&staged.metadata).await?;
        {
            let _guard = self.commit_lock.write().await;
            self.commit(path, &staged, &target, fail_if_exists).await?;
        }
        drop(staged);

        debug!(etag = %etag, "stored blob");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn delete(&self, path: &BlobPath) -> BlobResult<()> {
        let target = self.resolve(path);
        let _guard = self.commit_lock.write().await;

        match fs::remove_file(&target).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BlobError::not_found(path.as_str()))
            }
            Err(e) => return Err(e.into()),
        }

        match fs::remove_file(sidecar_path(&target)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("blob had no {} sidecar", METADATA_SUFFIX);
            }
            Err(e) => return Err(e.into()),
        }

        debug!("deleted blob");
        Ok(())
    }
}

/// Lazily open `file` and stream it in `buffer_size` chunks
fn read_file(file: PathBuf, buffer_size: usize) -> ByteStream {
    let stream = async_stream::stream! {
        let mut handle = match fs::File::open(&file).await {
            Ok(handle) => handle,
            Err(e) => {
                yield Err(e);
                return;
            }
        };

        loop {
            let mut buf = BytesMut::with_capacity(buffer_size);
            match handle.read_buf(&mut buf).await {
                Ok(0) => break,
                Ok(_) => yield Ok(buf.freeze()),
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    };
    Box::pin(stream)
}

async fn remove_quietly(file: &Path) {
    match fs::remove_file(file).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(file = %file.display(), error = %e, "failed to remove file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_open_creates_staging_dir() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("nested/store");

        let store = FileSystemBlobStore::open(FileSystemStoreConfig::new(&base))
            .await
            .unwrap();

        assert_eq!(store.base_path(), base.as_path());
        assert!(base.join(STAGING_DIR).is_dir());
    }

    #[tokio::test]
    async fn test_staging_dir_is_empty_after_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSystemBlobStore::open(FileSystemStoreConfig::new(dir.path()))
            .await
            .unwrap();
        let path = BlobPath::new("a/b").unwrap();

        store
            .store(&path, BlobInput::from_bytes("data", None), false)
            .await
            .unwrap();
        // A failing store must clean up too
        let bad = BlobInput::new(crate::input::single_chunk(Bytes::from_static(b"x")), Some(2));
        assert!(store.store(&path, bad, false).await.is_err());

        let mut entries = fs::read_dir(dir.path().join(STAGING_DIR)).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_store_removes_staged_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSystemBlobStore::open(FileSystemStoreConfig::new(dir.path()))
            .await
            .unwrap();
        let path = BlobPath::new("stalled").unwrap();

        // One chunk, then the producer never finishes
        let stalled = futures_util::stream::iter([Ok::<_, std::io::Error>(Bytes::from_static(b"partial"))])
            .chain(futures_util::stream::pending());
        let input = BlobInput::new(Box::pin(stalled) as ByteStream, None);

        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            store.store(&path, input, false),
        )
        .await;
        assert!(outcome.is_err());

        let mut entries = fs::read_dir(dir.path().join(STAGING_DIR)).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
        assert!(!dir.path().join("stalled").exists());
    }

    #[tokio::test]
    async fn test_directory_at_target_is_not_a_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSystemBlobStore::open(FileSystemStoreConfig::new(dir.path()))
            .await
            .unwrap();
        store
            .store(&BlobPath::new("a/b").unwrap(), BlobInput::from_bytes("data", None), false)
            .await
            .unwrap();
        let parent = BlobPath::new("a").unwrap();

        assert!(store.get_metadata(&parent).await.unwrap_err().is_not_found());
        for fail_if_exists in [true, false] {
            let err = store
                .store(&parent, BlobInput::from_bytes("x", None), fail_if_exists)
                .await
                .unwrap_err();
            assert!(matches!(err, BlobError::Invalid { .. }), "{err:?}");
        }
    }

    #[tokio::test]
    async fn test_read_file_chunks_by_buffer_size() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data");
        fs::write(&file, vec![7u8; 10]).await.unwrap();

        let chunks: Vec<_> = read_file(file, 4)
            .map(|chunk| chunk.unwrap().len())
            .collect()
            .await;
        assert_eq!(chunks.iter().sum::<usize>(), 10);
        assert!(chunks.iter().all(|len| *len <= 4));
    }

    #[tokio::test]
    async fn test_read_missing_file_yields_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut stream = read_file(dir.path().join("missing"), 16);

        let first = stream.next().await.unwrap();
        assert_eq!(first.unwrap_err().kind(), ErrorKind::NotFound);
        assert!(stream.next().await.is_none());
    }
}

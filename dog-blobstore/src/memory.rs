use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio::sync::RwLock;

use crate::input::single_chunk;
use crate::store::{ensure_concrete_content_type, ensure_declared_size};
use crate::{
    Blob, BlobError, BlobInput, BlobMetadata, BlobPath, BlobResult, BlobStore, Clock,
    ContentType, DigestAlgorithm, StoreId, SystemClock,
};

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
    content_type: ContentType,
    etag: String,
    last_modified: DateTime<Utc>,
}

/// Blob store that keeps everything in memory
pub struct MemoryBlobStore {
    id: StoreId,
    blobs: RwLock<HashMap<BlobPath, StoredBlob>>,
    digest: DigestAlgorithm,
    clock: Arc<dyn Clock>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Create with a custom clock for last-modified timestamps
    pub fn with_clock<C: Clock + 'static>(clock: C) -> Self {
        Self {
            id: StoreId::new(),
            blobs: RwLock::new(HashMap::new()),
            digest: DigestAlgorithm::default(),
            clock: Arc::new(clock),
        }
    }

    /// Use a different digest for etags
    pub fn with_digest_algorithm(mut self, digest: DigestAlgorithm) -> Self {
        self.digest = digest;
        self
    }

    /// Number of stored blobs
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    fn metadata_for(&self, path: &BlobPath, stored: &StoredBlob) -> BlobMetadata {
        BlobMetadata::new(
            self.id,
            path.clone(),
            stored.data.len() as u64,
            stored.content_type.clone(),
        )
        .with_etag(stored.etag.clone())
        .with_last_modified(stored.last_modified)
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn store_id(&self) -> StoreId {
        self.id
    }

    async fn get_metadata(&self, path: &BlobPath) -> BlobResult<BlobMetadata> {
        let blobs = self.blobs.read().await;
        let stored = blobs
            .get(path)
            .ok_or_else(|| BlobError::not_found(path.as_str()))?;
        Ok(self.metadata_for(path, stored))
    }

    async fn retrieve(&self, metadata: &BlobMetadata) -> BlobResult<Blob> {
        if metadata.store_id() != self.id {
            return Err(BlobError::invalid(
                "This BlobMetadata was created by a different BlobStore",
            ));
        }

        let blobs = self.blobs.read().await;
        let stored = blobs
            .get(&metadata.path)
            .ok_or_else(|| BlobError::not_found(metadata.path.as_str()))?;

        Ok(Blob::new(
            self.metadata_for(&metadata.path, stored),
            single_chunk(stored.data.clone()),
        ))
    }

    async fn store(&self, path: &BlobPath, input: BlobInput, fail_if_exists: bool) -> BlobResult<()> {
        ensure_concrete_content_type(&input)?;

        if fail_if_exists && self.blobs.read().await.contains_key(path) {
            return Err(BlobError::already_exists(path.as_str()));
        }

        let (mut data, size, content_type) = input.into_parts();

        let mut digester = self.digest.digester();
        let mut buffer = BytesMut::new();
        while let Some(chunk) = data.next().await {
            let chunk = chunk?;
            digester.update(&chunk);
            buffer.extend_from_slice(&chunk);
        }
        ensure_declared_size(size, buffer.len() as u64)?;

        let stored = StoredBlob {
            data: buffer.freeze(),
            content_type,
            etag: digester.finish_etag(),
            last_modified: self.clock.now(),
        };

        let mut blobs = self.blobs.write().await;
        // Re-check under the write lock; another writer may have won the race
        if fail_if_exists && blobs.contains_key(path) {
            return Err(BlobError::already_exists(path.as_str()));
        }
        blobs.insert(path.clone(), stored);
        tracing::debug!(path = %path, "stored blob in memory");

        Ok(())
    }

    async fn delete(&self, path: &BlobPath) -> BlobResult<()> {
        match self.blobs.write().await.remove(path) {
            Some(_) => {
                tracing::debug!(path = %path, "deleted blob from memory");
                Ok(())
            }
            None => Err(BlobError::not_found(path.as_str())),
        }
    }
}

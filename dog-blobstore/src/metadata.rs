use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{BlobPath, BlobResult, ByteStream, ContentType};

const MAX_PREALLOCATED_BYTES: usize = 8 * 1024 * 1024;

/// Identifies the store instance that produced a piece of metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreId(Uuid);

impl StoreId {
    /// Generate a new random store ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StoreId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata of a stored blob, obtained without reading its data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMetadata {
    pub path: BlobPath,
    pub size: u64,
    pub content_type: ContentType,
    /// Content digest, if the store computes one
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    store_id: StoreId,
}

impl BlobMetadata {
    pub fn new(store_id: StoreId, path: BlobPath, size: u64, content_type: ContentType) -> Self {
        Self {
            path,
            size,
            content_type,
            etag: None,
            last_modified: None,
            store_id,
        }
    }

    /// Set etag
    pub fn with_etag<S: Into<String>>(mut self, etag: S) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Set last modified timestamp
    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    /// The store that produced this metadata
    pub fn store_id(&self) -> StoreId {
        self.store_id
    }
}

/// A retrieved blob: its metadata plus a stream over its data.
///
/// The stream may fail when polled, for example if the blob was deleted
/// between retrieval and consumption.
pub struct Blob {
    pub metadata: BlobMetadata,
    pub data: ByteStream,
}

impl Blob {
    pub fn new(metadata: BlobMetadata, data: ByteStream) -> Self {
        Self { metadata, data }
    }

    pub fn path(&self) -> &BlobPath {
        &self.metadata.path
    }

    pub fn size(&self) -> u64 {
        self.metadata.size
    }

    pub fn content_type(&self) -> &ContentType {
        &self.metadata.content_type
    }

    pub fn etag(&self) -> Option<&str> {
        self.metadata.etag.as_deref()
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.metadata.last_modified
    }

    /// Consume the data stream and join all chunks
    pub async fn bytes(self) -> BlobResult<Bytes> {
        let capacity = usize::try_from(self.metadata.size)
            .unwrap_or(0)
            .min(MAX_PREALLOCATED_BYTES);
        let joined = self
            .data
            .try_fold(BytesMut::with_capacity(capacity), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await?;
        Ok(joined.freeze())
    }
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Blob, BlobError, BlobInput, BlobMetadata, BlobPath, BlobResult, StoreId};

/// Core blob storage operations - must be implemented by all storage backends
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Identity of this store instance; stamped on every [`BlobMetadata`] it returns
    fn store_id(&self) -> StoreId;

    /// Get blob metadata without retrieving the data.
    ///
    /// Fails with [`BlobError::NotFound`] if there is no blob at `path`.
    async fn get_metadata(&self, path: &BlobPath) -> BlobResult<BlobMetadata>;

    /// Retrieve a blob whose metadata was obtained from [`get_metadata`](Self::get_metadata).
    ///
    /// If the blob was deleted in the meantime, this may fail with
    /// [`BlobError::NotFound`], or it may succeed and the returned data stream
    /// fails when polled. Callers must handle both.
    ///
    /// Fails with [`BlobError::Invalid`] if `metadata` was produced by a different store.
    async fn retrieve(&self, metadata: &BlobMetadata) -> BlobResult<Blob>;

    /// Retrieve a blob directly, honoring conditional request semantics.
    ///
    /// Returns `Ok(None)` when retrieval is skipped because the blob's etag is
    /// listed in `if_none_match`, or because it was last modified before
    /// `if_modified_since`. A missing blob is an error, never `None`.
    async fn retrieve_direct(
        &self,
        path: &BlobPath,
        conditions: &RetrieveConditions,
    ) -> BlobResult<Option<Blob>> {
        let metadata = self.get_metadata(path).await?;
        if !conditions.should_retrieve(&metadata) {
            tracing::debug!(path = %path, "conditional retrieval skipped");
            return Ok(None);
        }
        self.retrieve(&metadata).await.map(Some)
    }

    /// Store a blob at `path`.
    ///
    /// If a blob already exists there, fails with [`BlobError::AlreadyExists`]
    /// when `fail_if_exists` is set and overwrites it otherwise.
    ///
    /// The operation is atomic: if it fails, no blob (not even a partial one)
    /// is left at `path` by this call.
    async fn store(&self, path: &BlobPath, input: BlobInput, fail_if_exists: bool) -> BlobResult<()>;

    /// Delete a blob. Fails with [`BlobError::NotFound`] if there is none at `path`.
    async fn delete(&self, path: &BlobPath) -> BlobResult<()>;

    /// Delete a blob if it exists.
    ///
    /// Returns `true` if a blob was deleted and `false` if none existed. Other
    /// failures are still reported as errors.
    async fn delete_if_exists(&self, path: &BlobPath) -> BlobResult<bool> {
        match self.delete(path).await {
            Ok(()) => Ok(true),
            Err(BlobError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Preconditions for [`BlobStore::retrieve_direct`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrieveConditions {
    /// Skip retrieval if the blob's etag is one of these
    pub if_none_match: BTreeSet<String>,
    /// Skip retrieval if the blob was last modified before this instant
    pub if_modified_since: Option<DateTime<Utc>>,
}

impl RetrieveConditions {
    /// No preconditions: always retrieve
    pub fn new() -> Self {
        Self::default()
    }

    pub fn if_none_match<I, S>(mut self, etags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.if_none_match.extend(etags.into_iter().map(Into::into));
        self
    }

    pub fn if_modified_since(mut self, instant: DateTime<Utc>) -> Self {
        self.if_modified_since = Some(instant);
        self
    }

    /// Whether a blob with this metadata should be retrieved
    pub fn should_retrieve(&self, metadata: &BlobMetadata) -> bool {
        if let Some(etag) = &metadata.etag {
            if self.if_none_match.contains(etag) {
                return false;
            }
        }

        if let (Some(since), Some(last_modified)) = (self.if_modified_since, metadata.last_modified) {
            if last_modified < since {
                return false;
            }
        }

        true
    }
}

/// Shared precondition for [`BlobStore::store`]: blobs are stored under a concrete content type
pub(crate) fn ensure_concrete_content_type(input: &BlobInput) -> BlobResult<()> {
    if !input.content_type().is_concrete() {
        return Err(BlobError::invalid(format!(
            "Blob content type must not contain wildcards: {}",
            input.content_type()
        )));
    }
    Ok(())
}

/// Shared check that the streamed byte count matches the declared size
pub(crate) fn ensure_declared_size(declared: Option<u64>, actual: u64) -> BlobResult<()> {
    match declared {
        Some(expected) if expected != actual => Err(BlobError::invalid(format!(
            "Blob declared size {} but data contained {} bytes",
            expected, actual
        ))),
        _ => Ok(()),
    }
}

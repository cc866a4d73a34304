use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{BlobError, BlobResult, DigestAlgorithm};

/// Configuration for a [`FileSystemBlobStore`](super::FileSystemBlobStore)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileSystemStoreConfig {
    /// Directory under which blobs are stored
    pub base_path: PathBuf,

    /// Digest used to compute etags
    pub digest_algorithm: DigestAlgorithm,

    /// Chunk size when streaming blob data back out
    pub buffer_size: usize,
}

impl Default for FileSystemStoreConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::new(),
            digest_algorithm: DigestAlgorithm::Sha256,
            buffer_size: 4096,
        }
    }
}

impl FileSystemStoreConfig {
    /// Create a new config rooted at `base_path`, with defaults otherwise
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    /// Set digest algorithm
    pub fn with_digest_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.digest_algorithm = algorithm;
        self
    }

    /// Set read buffer size
    pub fn with_buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes;
        self
    }

    pub fn validate(&self) -> BlobResult<()> {
        if self.base_path.as_os_str().is_empty() {
            return Err(BlobError::invalid("Filesystem blob store requires a base path"));
        }
        if self.buffer_size == 0 {
            return Err(BlobError::invalid("Buffer size must be greater than zero"));
        }
        Ok(())
    }
}

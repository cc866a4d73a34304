use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{BlobResult, BlobStore, DigestAlgorithm, FileSystemBlobStore, FileSystemStoreConfig, MemoryBlobStore};

/// Declarative settings for one blob store.
///
/// Serialized with a single key naming the store type:
///
/// ```json
/// { "filesystem": { "base-path": "/var/lib/blobs", "digest-algorithm": "SHA-256" } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreConfig {
    Filesystem(FileSystemStoreConfig),
    Memory(MemoryStoreConfig),
}

/// Settings for a [`MemoryBlobStore`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MemoryStoreConfig {
    pub digest_algorithm: DigestAlgorithm,
}

impl StoreConfig {
    /// Short name of the store type, matching the serialized key
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Filesystem(_) => "filesystem",
            Self::Memory(_) => "memory",
        }
    }

    /// Construct the configured store
    pub async fn build(&self) -> BlobResult<Arc<dyn BlobStore>> {
        let store: Arc<dyn BlobStore> = match self {
            Self::Filesystem(config) => Arc::new(FileSystemBlobStore::open(config.clone()).await?),
            Self::Memory(config) => {
                Arc::new(MemoryBlobStore::new().with_digest_algorithm(config.digest_algorithm))
            }
        };
        Ok(store)
    }
}

/// Build every store in a name → settings map
pub async fn build_stores(
    configs: &BTreeMap<String, StoreConfig>,
) -> BlobResult<BTreeMap<String, Arc<dyn BlobStore>>> {
    let mut stores = BTreeMap::new();
    for (name, config) in configs {
        tracing::debug!(name = %name, kind = config.kind(), "building blob store");
        stores.insert(name.clone(), config.build().await?);
    }
    Ok(stores)
}

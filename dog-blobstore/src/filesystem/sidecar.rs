use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::path::METADATA_SUFFIX;
use crate::{BlobError, BlobPath, BlobResult, ContentType};

/// Metadata persisted next to each blob file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct Sidecar {
    pub content_type: ContentType,
    pub etag: String,
    pub last_modified: DateTime<Utc>,
}

impl Sidecar {
    pub async fn write(&self, file: &Path) -> BlobResult<()> {
        let encoded = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(file, encoded).await?;
        Ok(())
    }

    /// Read a sidecar; a missing file means the blob does not exist
    pub async fn read(file: &Path, blob: &BlobPath) -> BlobResult<Self> {
        let raw = match tokio::fs::read(file).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BlobError::not_found(blob.as_str()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&raw)?)
    }
}

/// `<file>.metadata` next to `file`
pub(crate) fn sidecar_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(METADATA_SUFFIX);
    PathBuf::from(name)
}

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{BlobError, BlobResult};

/// Directory under a store root reserved for in-flight writes
pub(crate) const STAGING_DIR: &str = ".tmp";

/// Suffix reserved for metadata sidecar files
pub(crate) const METADATA_SUFFIX: &str = ".metadata";

/// Location of a blob within a store: a relative, `/`-separated path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobPath(String);

impl BlobPath {
    /// Validate and wrap a path string
    pub fn new<S: Into<String>>(path: S) -> BlobResult<Self> {
        let path = path.into();
        Self::validate(&path)?;
        Ok(Self(path))
    }

    fn validate(path: &str) -> BlobResult<()> {
        if path.is_empty() {
            return Err(BlobError::invalid_path(path, "must not be empty"));
        }
        if path.starts_with('/') {
            return Err(BlobError::invalid_path(path, "must be relative"));
        }
        if path.contains('\\') || path.contains('\0') {
            return Err(BlobError::invalid_path(path, "contains an illegal character"));
        }

        let segments: Vec<&str> = path.split('/').collect();
        for segment in &segments {
            match *segment {
                "" => return Err(BlobError::invalid_path(path, "contains an empty segment")),
                "." | ".." => {
                    return Err(BlobError::invalid_path(path, "contains a relative segment"))
                }
                _ => {}
            }
        }

        if segments.first() == Some(&STAGING_DIR) {
            return Err(BlobError::invalid_path(path, "uses the reserved staging directory"));
        }
        if segments.last().is_some_and(|last| last.ends_with(METADATA_SUFFIX)) {
            return Err(BlobError::invalid_path(path, "uses the reserved metadata suffix"));
        }

        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments, in order
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Last segment of the path
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Platform path relative to a store root
    pub(crate) fn to_relative_path_buf(&self) -> PathBuf {
        self.segments().collect()
    }
}

impl fmt::Display for BlobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BlobPath {
    type Error = BlobError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for BlobPath {
    type Error = BlobError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl std::str::FromStr for BlobPath {
    type Err = BlobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<BlobPath> for String {
    fn from(path: BlobPath) -> Self {
        path.0
    }
}

impl AsRef<str> for BlobPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

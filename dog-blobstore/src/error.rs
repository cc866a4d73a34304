use thiserror::Error;

/// Result type for blob store operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur during blob store operations
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("The blob {path} does not exist in this blob store")]
    NotFound { path: String },

    #[error("The blob {path} already exists in this blob store")]
    AlreadyExists { path: String },

    #[error("Invalid content type {value:?}: {reason}")]
    InvalidContentType { value: String, reason: String },

    #[error("Invalid blob path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl BlobError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(path: S) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an already exists error
    pub fn already_exists<S: Into<String>>(path: S) -> Self {
        Self::AlreadyExists { path: path.into() }
    }

    /// Create an invalid content type error for an unparseable value
    pub fn invalid_content_type<V: Into<String>, R: Into<String>>(value: V, reason: R) -> Self {
        Self::InvalidContentType {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid path error for a path that failed validation
    pub fn invalid_path<P: Into<String>, R: Into<String>>(path: P, reason: R) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error means the blob does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

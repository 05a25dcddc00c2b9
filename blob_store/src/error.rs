//! Error types for blob store operations.

use std::fmt;

/// Result type for blob store operations.
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur during blob store operations.
#[derive(Debug)]
pub enum BlobError {
    /// No blob exists under the requested key.
    NotFound { key: String },

    /// Invalid URL format or scheme.
    InvalidUri { uri: String, reason: String },

    /// Backend failure (network, credentials, I/O).
    Backend { source: anyhow::Error },
}

impl fmt::Display for BlobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobError::NotFound { key } => write!(f, "blob not found: {}", key),
            BlobError::InvalidUri { uri, reason } => {
                write!(f, "invalid blob storage URL '{}': {}", uri, reason)
            }
            BlobError::Backend { source } => write!(f, "blob storage error: {}", source),
        }
    }
}

impl std::error::Error for BlobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlobError::Backend { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<object_store::Error> for BlobError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => BlobError::NotFound { key: path },
            _ => BlobError::Backend {
                source: anyhow::Error::from(err),
            },
        }
    }
}

impl From<anyhow::Error> for BlobError {
    fn from(err: anyhow::Error) -> Self {
        BlobError::Backend { source: err }
    }
}

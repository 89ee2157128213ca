//! Error types for the storage layer.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure reading or writing one of the store's documents.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected document shape in {}: {reason}", path.display())]
    Shape { path: PathBuf, reason: String },
}

impl StorageError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn shape(path: &Path, reason: impl Into<String>) -> Self {
        Self::Shape {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// The file the error relates to.
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. } | Self::Json { path, .. } | Self::Shape { path, .. } => path,
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

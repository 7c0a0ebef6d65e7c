//! Storage Manager error types

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage Manager error type
#[derive(Error, Debug)]
pub enum Error {
    /// Artifact or entity is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Undecodable message or invalid identifier
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Filesystem rejected the operation
    #[error("Storage unavailable at {}: {source}", path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map an I/O failure on `path` into the domain error kinds.
    ///
    /// `NotFound` stays `NotFound`; everything else is `StorageUnavailable`.
    pub fn from_io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.display().to_string())
        } else {
            Self::StorageUnavailable {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// Stable machine-readable code for API responses
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::MalformedInput(_) => "BAD_REQUEST",
            Self::StorageUnavailable { .. } => "STORAGE_UNAVAILABLE",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type alias for Storage Manager operations
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for the SAT store
//!
//! Every filesystem failure carries the path it happened on so the HTTP
//! layer can report something actionable.

use crate::submission::IllegalTransition;
use sat_record::TreeError;
use std::path::{Path, PathBuf};

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Could not create the containing directory
    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        /// Directory that failed
        path: PathBuf,
        #[source]
        /// Underlying failure
        source: std::io::Error,
    },

    /// Read failed
    #[error("io error reading {path}: {source}")]
    Read {
        /// File that failed
        path: PathBuf,
        #[source]
        /// Underlying failure
        source: std::io::Error,
    },

    /// Write or append failed
    #[error("io error writing {path}: {source}")]
    Write {
        /// File that failed
        path: PathBuf,
        #[source]
        /// Underlying failure
        source: std::io::Error,
    },

    /// Value could not be serialized
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Stored tree is not a valid board
    #[error("invalid tree in {path}: {source}")]
    InvalidTree {
        /// File holding the tree
        path: PathBuf,
        #[source]
        /// Validation failure
        source: TreeError,
    },

    /// Submission driven through an illegal state change
    #[error(transparent)]
    Submission(#[from] IllegalTransition),

    /// Primary and fallback persistence both failed
    #[error("persist failed ({primary}); fallback also failed ({fallback})")]
    FallbackFailed {
        /// Primary failure
        primary: Box<StoreError>,
        /// Fallback failure
        fallback: Box<StoreError>,
    },
}

impl StoreError {
    /// Create directory error for path
    pub fn create_dir(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::CreateDir {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create read error for path
    pub fn read(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create write error for path
    pub fn write(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether the error means the file simply does not exist
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Create every missing parent directory of `path`
///
/// # Errors
/// `StoreError::CreateDir` when creation fails.
pub async fn ensure_parent_dir(path: &Path) -> StoreResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::create_dir(parent, e)),
        _ => Ok(()),
    }
}

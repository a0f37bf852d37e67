//! Error types for the download module.

use std::path::PathBuf;
use thiserror::Error;

use crate::searcher::RemoteError;

/// Errors that can occur while downloading and saving a subtitle.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Every attempt failed with a retryable error.
    #[error("Download failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: RemoteError,
    },

    /// The remote call failed in a way retrying cannot fix.
    #[error("Download failed: {0}")]
    Remote(#[source] RemoteError),

    /// Failed to create destination directory.
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every disambiguated variant of the name is taken.
    #[error("Unable to find unique filename for: {}", .0.display())]
    NoUniqueName(PathBuf),

    /// Failed to write the file.
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Batch was cancelled before this item started.
    #[error("Download cancelled")]
    Cancelled,
}

impl DownloadError {
    /// The remote error behind this failure, if any.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::RetriesExhausted { source, .. } | Self::Remote(source) => Some(source),
            _ => None,
        }
    }
}

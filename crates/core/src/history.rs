//! Persisted download history.
//!
//! Stored as a pretty-printed JSON array, newest entry first, capped at
//! [`MAX_HISTORY_ENTRIES`].

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

pub const MAX_HISTORY_ENTRIES: usize = 100;

/// Timestamp format of [`HistoryEntry::time`].
pub const HISTORY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Failed to write history {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode history: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Where a download came from. Manual downloads carry no source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistorySource {
    Watcher,
    Smb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Saved file name.
    pub name: String,
    /// Full saved path.
    pub path: String,
    /// Local time, `%Y-%m-%d %H:%M:%S`.
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<HistorySource>,
}

impl HistoryEntry {
    /// Entry for a file saved now.
    pub fn now(path: &Path, source: Option<HistorySource>) -> Self {
        Self {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: path.display().to_string(),
            time: Local::now().format(HISTORY_TIME_FORMAT).to_string(),
            source,
        }
    }
}

/// Download history bound to its JSON file.
#[derive(Debug)]
pub struct DownloadHistory {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
}

impl DownloadHistory {
    /// Load history from `path`. A missing file gives an empty history; an
    /// unreadable or corrupt one is logged and treated as empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Vec<HistoryEntry>>(&text) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring corrupt download history");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read download history");
                Vec::new()
            }
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries, newest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Record `entry` as the newest and persist.
    pub fn add(&mut self, entry: HistoryEntry) -> Result<(), HistoryError> {
        self.entries.insert(0, entry);
        self.entries.truncate(MAX_HISTORY_ENTRIES);
        self.save()
    }

    /// Forget all entries and persist.
    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.entries.clear();
        self.save()
    }

    fn save(&self) -> Result<(), HistoryError> {
        let io_error = |source| HistoryError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json).map_err(io_error)
    }
}

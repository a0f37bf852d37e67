//! Types for the directory watcher.

use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::config::{default_watch_file_types, DirectoryWatcherConfig};
use crate::pipeline::PipelineOutcome;

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Directory watching is not available on this system")]
    Unavailable,

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Directory is already watched: {0}")]
    AlreadyWatched(PathBuf),

    #[error("Directory is not watched: {0}")]
    NotWatched(PathBuf),

    #[error("Failed to resolve {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to watch {path}: {message}")]
    Notify { path: PathBuf, message: String },

    #[error("The watcher must be started inside a tokio runtime")]
    NoRuntime,
}

/// One monitored directory and its settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchDirectory {
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Extensions including the dot, e.g. ".mkv". Compared case-insensitively.
    #[serde(default = "default_watch_file_types")]
    pub file_types: Vec<String>,
    /// Where subtitles go; empty means the configured default.
    #[serde(default)]
    pub output_dir: String,
    /// Rank candidates with the quality evaluator.
    #[serde(default)]
    pub use_ai: bool,
}

fn default_true() -> bool {
    true
}

impl WatchDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            enabled: true,
            file_types: default_watch_file_types(),
            output_dir: String::new(),
            use_ai: false,
        }
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<String>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_file_types(mut self, file_types: Vec<String>) -> Self {
        self.file_types = file_types;
        self
    }

    pub fn with_ai(mut self, use_ai: bool) -> Self {
        self.use_ai = use_ai;
        self
    }

    /// Output directory override, if set.
    pub fn output_dir(&self) -> Option<&Path> {
        let trimmed = self.output_dir.trim();
        (!trimmed.is_empty()).then(|| Path::new(trimmed))
    }

    /// Whether `path` has one of this entry's extensions.
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(ext) = path.extension() else {
            return false;
        };
        let ext = format!(".{}", ext.to_string_lossy().to_lowercase());
        self.file_types.iter().any(|t| {
            let t = t.trim().to_lowercase();
            t == ext || format!(".{}", t) == ext
        })
    }
}

/// A registered directory with its derived monitor state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchDirectoryStatus {
    #[serde(flatten)]
    pub directory: WatchDirectory,
    pub is_watching: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherEventKind {
    Add,
    Remove,
    Update,
    Watch,
    Unwatch,
    Start,
    Stop,
    NewFile,
    Saved,
    NoMatch,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Success,
    Pending,
    Skipped,
    Error,
}

/// Entry in the watcher's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatcherEvent {
    pub event_type: WatcherEventKind,
    pub file_path: String,
    /// Local time, `%Y-%m-%d %H:%M:%S`.
    pub timestamp: String,
    pub status: EventStatus,
    pub message: String,
}

impl WatcherEvent {
    pub fn now(
        event_type: WatcherEventKind,
        file_path: &Path,
        status: EventStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            file_path: file_path.display().to_string(),
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            status,
            message: message.into(),
        }
    }
}

/// Timing of arrival handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherSettings {
    /// Wait after an event before probing the file.
    pub settle_delay: Duration,
    /// Interval between readiness checks.
    pub poll_interval: Duration,
    /// Give up on files that stay unreadable this long.
    pub readiness_timeout: Duration,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self::from(&DirectoryWatcherConfig::default())
    }
}

impl From<&DirectoryWatcherConfig> for WatcherSettings {
    fn from(config: &DirectoryWatcherConfig) -> Self {
        Self {
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            readiness_timeout: Duration::from_secs(config.readiness_timeout_secs),
        }
    }
}

/// Receives files that arrived in a watched directory.
///
/// Called from the watcher's async dispatcher, never from the OS
/// notification thread.
#[async_trait]
pub trait FileArrivalHandler: Send + Sync {
    async fn on_file_arrived(&self, path: &Path, watch_dir: &WatchDirectory) -> PipelineOutcome;
}

/// Build watch entries from the persisted config, filling unset file types
/// and output directories with the section defaults.
pub fn watch_directories_from_config(config: &DirectoryWatcherConfig) -> Vec<WatchDirectory> {
    config
        .watch_directories
        .iter()
        .map(|d| {
            let mut dir = d.clone();
            if dir.file_types.is_empty() {
                dir.file_types = config.default_file_types.clone();
            }
            if dir.output_dir.trim().is_empty() {
                dir.output_dir = config.default_output_dir.clone();
            }
            dir.use_ai = dir.use_ai || config.use_ai_by_default;
            dir
        })
        .collect()
}

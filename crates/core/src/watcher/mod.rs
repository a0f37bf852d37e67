//! Directory watcher: detects new video files and runs the subtitle
//! pipeline for each.

mod monitor;
mod types;

pub use monitor::{DirectoryWatcher, EventListener, MAX_EVENT_LOG};
pub use types::*;

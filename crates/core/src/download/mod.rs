//! Subtitle download: retrying fetches, safe file naming and the
//! bounded-concurrency batch downloader.

mod batch;
mod error;
mod naming;
mod retry;

pub use batch::{
    download_one, BatchDownloader, BatchProgress, BatchReport, BatchSummary, CancellationFlag,
    DownloadOptions, ProgressCallback, SavedFile, MAX_DISPLAYED_ERRORS,
};
pub use error::DownloadError;
pub use naming::{
    candidate_file_name, ensure_dir, ensure_unique_path, sanitize_component, write_overwrite,
    write_unique, UniqueNameStyle, EXT_MAX_LEN, MAX_UNIQUE_ATTEMPTS, NAME_MAX_LEN,
    QUERY_DIR_MAX_LEN,
};
pub use retry::{fetch_with_retries, retry_remote, RetryPolicy, DEFAULT_BASE_DELAY};

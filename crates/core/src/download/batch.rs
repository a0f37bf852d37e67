//! Bounded-concurrency batch downloader.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use crate::metrics;
use crate::searcher::{Candidate, SubtitleIndex};

use super::naming::{
    candidate_file_name, ensure_dir, write_overwrite, write_unique, UniqueNameStyle,
};
use super::retry::{fetch_with_retries, RetryPolicy};
use super::DownloadError;

/// Error lines shown to the user at the end of a batch run.
pub const MAX_DISPLAYED_ERRORS: usize = 50;

/// Options shared by single and batch downloads.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Per-attempt timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Replace an existing file instead of picking a free name.
    pub overwrite: bool,
    pub name_style: UniqueNameStyle,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            overwrite: false,
            name_style: UniqueNameStyle::Parenthesized,
        }
    }
}

/// Download one candidate into `out_dir` and return the saved path.
pub async fn download_one(
    index: &dyn SubtitleIndex,
    candidate: &Candidate,
    out_dir: &Path,
    options: &DownloadOptions,
) -> Result<PathBuf, DownloadError> {
    ensure_dir(out_dir)?;

    let bytes = fetch_with_retries(index, &candidate.url, options.timeout, &options.retry).await?;

    let target = out_dir.join(candidate_file_name(candidate));
    let overwrite = options.overwrite;
    let style = options.name_style;
    let saved = tokio::task::spawn_blocking(move || {
        if overwrite {
            write_overwrite(&target, &bytes)
        } else {
            write_unique(&target, &bytes, style)
        }
    })
    .await
    .map_err(|e| DownloadError::Io {
        path: out_dir.to_path_buf(),
        source: std::io::Error::other(e.to_string()),
    })??;

    debug!(path = %saved.display(), "Saved subtitle");
    Ok(saved)
}

/// A file saved by a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedFile {
    pub query: String,
    pub name: String,
    pub path: PathBuf,
}

/// Outcome of one batch: every item ends up in exactly one of the lists.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub saved: Vec<SavedFile>,
    /// `"{query}: {name}: {error}"` lines.
    pub errors: Vec<String>,
    /// Items never started because the batch was cancelled.
    pub skipped: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.saved.len() + self.errors.len() + self.skipped
    }
}

/// Progress snapshot passed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
}

/// Called once per finished item (saved, failed or skipped).
pub type ProgressCallback = Arc<dyn Fn(BatchProgress) + Send + Sync>;

/// Shared flag that stops a batch from starting new downloads.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Downloads a list of candidates with at most `concurrency` in flight.
pub struct BatchDownloader {
    index: Arc<dyn SubtitleIndex>,
    concurrency: usize,
    options: DownloadOptions,
    cancel: CancellationFlag,
    progress: Option<ProgressCallback>,
}

impl BatchDownloader {
    /// Creates a downloader. A concurrency of 0 is treated as 1.
    pub fn new(index: Arc<dyn SubtitleIndex>, concurrency: usize, options: DownloadOptions) -> Self {
        Self {
            index,
            concurrency: concurrency.max(1),
            options,
            cancel: CancellationFlag::new(),
            progress: None,
        }
    }

    /// Reports progress after each item.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Uses an externally owned cancellation flag.
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancel = flag;
        self
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Download every candidate into `out_dir`.
    ///
    /// All items are scheduled at once and wait on the semaphore. A failing
    /// item is recorded and never stops the others.
    pub async fn run(&self, query: &str, candidates: &[Candidate], out_dir: &Path) -> BatchReport {
        let total = candidates.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let saved = Mutex::new(Vec::new());
        let errors = Mutex::new(Vec::new());
        let skipped = AtomicUsize::new(0);
        let completed = AtomicUsize::new(0);

        info!(
            query = %query,
            items = total,
            concurrency = self.concurrency,
            out_dir = %out_dir.display(),
            "Starting batch download"
        );

        let tasks = candidates.iter().map(|candidate| {
            let semaphore = Arc::clone(&semaphore);
            let saved = &saved;
            let errors = &errors;
            let skipped = &skipped;
            let completed = &completed;
            async move {
                let permit = semaphore.acquire().await;

                if permit.is_err() || self.cancel.is_cancelled() {
                    skipped.fetch_add(1, Ordering::SeqCst);
                } else {
                    match download_one(self.index.as_ref(), candidate, out_dir, &self.options).await
                    {
                        Ok(path) => {
                            metrics::DOWNLOADS_COMPLETED.inc();
                            saved.lock().await.push(SavedFile {
                                query: query.to_string(),
                                name: candidate.name.clone(),
                                path,
                            });
                        }
                        Err(e) => {
                            metrics::DOWNLOADS_FAILED.inc();
                            warn!(query = %query, name = %candidate.name, error = %e, "Download failed");
                            errors
                                .lock()
                                .await
                                .push(format!("{}: {}: {}", query, candidate.name, e));
                        }
                    }
                }
                drop(permit);

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(callback) = &self.progress {
                    callback(BatchProgress {
                        completed: done,
                        total,
                    });
                }
            }
        });

        futures::future::join_all(tasks).await;

        let report = BatchReport {
            saved: saved.into_inner(),
            errors: errors.into_inner(),
            skipped: skipped.into_inner(),
        };

        info!(
            query = %query,
            saved = report.saved.len(),
            failed = report.errors.len(),
            skipped = report.skipped,
            "Batch download complete"
        );

        report
    }
}

/// Running tally across the queries of a multi-query run.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl BatchSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finished batch.
    pub fn record(&mut self, report: &BatchReport) {
        self.success += report.saved.len();
        self.failed += report.errors.len();
        self.skipped += report.skipped;
        self.errors.extend(report.errors.iter().cloned());
    }

    /// Add a failure that happened outside a batch (e.g. a failed search).
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.failed += 1;
        self.errors.push(message.into());
    }

    /// `success=N failed=M`
    pub fn tally(&self) -> String {
        format!("success={} failed={}", self.success, self.failed)
    }

    /// At most [`MAX_DISPLAYED_ERRORS`] error lines.
    pub fn display_errors(&self) -> &[String] {
        &self.errors[..self.errors.len().min(MAX_DISPLAYED_ERRORS)]
    }

    /// 0 if anything succeeded and nothing failed, 1 if anything failed,
    /// 2 if nothing succeeded.
    pub fn exit_code(&self) -> i32 {
        if self.success > 0 && self.failed == 0 {
            0
        } else if self.failed > 0 {
            1
        } else {
            2
        }
    }
}

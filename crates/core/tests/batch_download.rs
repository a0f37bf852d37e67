//! Batch downloader integration tests.
//!
//! These tests verify the bounded-concurrency downloader with a mock index:
//! - At most `concurrency` fetches in flight
//! - Per-item retries and failure isolation
//! - Cancellation and progress reporting

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use subgrab_core::{
    download::{BatchDownloader, BatchProgress, BatchSummary, DownloadOptions, RetryPolicy, UniqueNameStyle},
    searcher::{Candidate, RemoteError},
    testing::{fixtures, MockSubtitleIndex},
};

fn options(retries: u32) -> DownloadOptions {
    DownloadOptions {
        timeout: Duration::from_secs(1),
        retry: RetryPolicy::new(retries).with_base_delay(Duration::from_millis(1)),
        overwrite: false,
        name_style: UniqueNameStyle::Parenthesized,
    }
}

async fn serve_all(index: &MockSubtitleIndex, count: usize) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for i in 0..count {
        let candidate = fixtures::candidate(&format!("id{}", i), &format!("Episode {}", i));
        index
            .set_content(&candidate.url, fixtures::srt(&[&format!("line {}", i)]))
            .await;
        candidates.push(candidate);
    }
    candidates
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let index = Arc::new(MockSubtitleIndex::new());
    index.set_latency(Duration::from_millis(30)).await;
    let candidates = serve_all(&index, 12).await;
    let out = TempDir::new().unwrap();

    let downloader = BatchDownloader::new(index.clone() as Arc<dyn subgrab_core::SubtitleIndex>, 3, options(0));
    let report = downloader.run("show", &candidates, out.path()).await;

    assert_eq!(report.saved.len(), 12);
    assert!(report.errors.is_empty());
    assert!(index.max_in_flight() <= 3, "peak {}", index.max_in_flight());
    assert!(index.max_in_flight() >= 2);
    assert_eq!(index.total_fetches().await, 12);
}

#[tokio::test]
async fn test_failures_are_isolated_and_retried() {
    let index = Arc::new(MockSubtitleIndex::new());
    let candidates = serve_all(&index, 4).await;
    let transient = RemoteError::HttpStatus {
        status: 503,
        message: "busy".to_string(),
    };
    index
        .fail_fetches(&candidates[1].url, vec![transient.clone()])
        .await;
    index
        .fail_fetches(&candidates[2].url, vec![transient.clone(), transient.clone(), transient])
        .await;
    let out = TempDir::new().unwrap();

    let downloader = BatchDownloader::new(index.clone() as Arc<dyn subgrab_core::SubtitleIndex>, 2, options(2));
    let report = downloader.run("show", &candidates, out.path()).await;

    assert_eq!(report.saved.len(), 3);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("Episode 2"));
    assert_eq!(index.fetch_count(&candidates[1].url).await, 2);
    assert_eq!(index.fetch_count(&candidates[2].url).await, 3);

    let mut summary = BatchSummary::new();
    summary.record(&report);
    assert_eq!(summary.tally(), "success=3 failed=1");
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn test_same_names_get_distinct_files() {
    let index = Arc::new(MockSubtitleIndex::new());
    let mut candidates = Vec::new();
    for id in ["x", "y", "z"] {
        let candidate = fixtures::candidate(id, "Same Name");
        index.set_content(&candidate.url, fixtures::srt(&[id])).await;
        candidates.push(candidate);
    }
    let out = TempDir::new().unwrap();

    let downloader = BatchDownloader::new(index.clone() as Arc<dyn subgrab_core::SubtitleIndex>, 3, options(0));
    let report = downloader.run("q", &candidates, out.path()).await;

    let mut names: Vec<_> = report
        .saved
        .iter()
        .map(|s| s.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["Same Name (1).srt", "Same Name (2).srt", "Same Name.srt"]
    );
}

#[tokio::test]
async fn test_cancelled_batch_skips_pending_items() {
    let index = Arc::new(MockSubtitleIndex::new());
    index.set_latency(Duration::from_millis(50)).await;
    let candidates = serve_all(&index, 6).await;
    let out = TempDir::new().unwrap();

    let downloader = BatchDownloader::new(index.clone() as Arc<dyn subgrab_core::SubtitleIndex>, 1, options(0));
    let flag = downloader.cancellation();
    let progress = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&progress);
    let downloader = downloader.with_progress(Arc::new(move |p: BatchProgress| {
        seen.store(p.completed, Ordering::SeqCst);
        if p.completed == 1 {
            flag.cancel();
        }
    }));

    let report = downloader.run("q", &candidates, out.path()).await;

    assert_eq!(report.total(), 6);
    assert_eq!(report.saved.len(), 1);
    assert_eq!(report.skipped, 5);
    assert_eq!(progress.load(Ordering::SeqCst), 6);
}

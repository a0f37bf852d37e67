//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Searches against the subtitle index
//! - Downloads (completed, failed, retries)
//! - Quality evaluations
//! - Directory watcher arrivals

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

// =============================================================================
// Search Metrics
// =============================================================================

/// Searches total by result.
pub static SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("subgrab_searches_total", "Total subtitle index searches"),
        &["result"], // "ok", "empty", "malformed", "error"
    )
    .unwrap()
});

// =============================================================================
// Download Metrics
// =============================================================================

/// Downloads completed total.
pub static DOWNLOADS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "subgrab_downloads_completed_total",
        "Total subtitle files saved",
    )
    .unwrap()
});

/// Downloads failed total.
pub static DOWNLOADS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "subgrab_downloads_failed_total",
        "Total subtitle downloads that failed",
    )
    .unwrap()
});

/// Retry attempts total.
pub static DOWNLOAD_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "subgrab_download_retries_total",
        "Total fetch attempts repeated after a retryable failure",
    )
    .unwrap()
});

// =============================================================================
// Evaluation Metrics
// =============================================================================

/// Quality evaluations total by evaluator and result.
pub static EVALUATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("subgrab_evaluations_total", "Total subtitle quality evaluations"),
        &["evaluator", "result"], // result: "ok", "invalid", "unavailable"
    )
    .unwrap()
});

// =============================================================================
// Watcher Metrics
// =============================================================================

/// Files handed to the pipeline by the watcher, by outcome.
pub static WATCHER_ARRIVALS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("subgrab_watcher_arrivals_total", "Total new files processed"),
        &["outcome"], // "saved", "no_results", "no_match", "failed"
    )
    .unwrap()
});

/// Registry holding every core metric.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_core_metrics(&registry);
    registry
});

/// Register all core metrics with a registry.
pub fn register_core_metrics(registry: &Registry) {
    registry.register(Box::new(SEARCHES.clone())).ok();
    registry.register(Box::new(DOWNLOADS_COMPLETED.clone())).ok();
    registry.register(Box::new(DOWNLOADS_FAILED.clone())).ok();
    registry.register(Box::new(DOWNLOAD_RETRIES.clone())).ok();
    registry.register(Box::new(EVALUATIONS.clone())).ok();
    registry.register(Box::new(WATCHER_ARRIVALS.clone())).ok();
}

/// Render all core metrics in the Prometheus text format.
pub fn gather_text() -> String {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .ok();
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_text_contains_registered_metrics() {
        SEARCHES.with_label_values(&["ok"]).inc();
        DOWNLOADS_COMPLETED.inc();

        let text = gather_text();
        assert!(text.contains("subgrab_searches_total"));
        assert!(text.contains("subgrab_downloads_completed_total"));
    }
}

//! Subcommand implementations. Each returns the process exit code.

mod batch;
mod fetch;
mod local;
mod watch;

pub use batch::{batch, BatchRequest};
pub use fetch::{download, search, DownloadRequest};
pub use local::{config, episodes, evaluate, history};
pub use watch::watch;

use std::time::Duration;

use subgrab_core::config::seconds;
use subgrab_core::download::{DownloadOptions, RetryPolicy, UniqueNameStyle};
use subgrab_core::searcher::SearchOptions;

use crate::cli::{FilterArgs, TransferArgs};
use crate::AppContext;

/// Search options from the flags, falling back to the configured filters.
fn search_options(ctx: &AppContext, filters: &FilterArgs, timeout: Option<f64>) -> SearchOptions {
    let config = &ctx.config;
    SearchOptions {
        limit: usize::from(filters.limit),
        min_score: filters
            .min_score
            .or((config.min_score > 0.0).then_some(config.min_score)),
        language: filters
            .lang
            .clone()
            .or_else(|| Some(config.language.clone()))
            .filter(|l| !l.trim().is_empty()),
        timeout: timeout
            .map(seconds)
            .unwrap_or_else(|| config.search_request_timeout()),
    }
}

fn download_options(ctx: &AppContext, transfer: &TransferArgs, overwrite: bool) -> DownloadOptions {
    let timeout: Duration = transfer
        .timeout
        .map(seconds)
        .unwrap_or_else(|| ctx.config.download_timeout());
    DownloadOptions {
        timeout,
        retry: RetryPolicy::new(transfer.retries.unwrap_or(ctx.config.retries)),
        overwrite,
        name_style: UniqueNameStyle::Parenthesized,
    }
}

//! `batch`: search several queries, select, download concurrently.

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use subgrab_core::download::{
    sanitize_component, BatchDownloader, BatchProgress, BatchSummary, CancellationFlag,
    QUERY_DIR_MAX_LEN,
};
use subgrab_core::history::{DownloadHistory, HistoryEntry};
use subgrab_core::searcher::search_items;
use subgrab_core::selector::{parse_select_spec, DeterministicSelector, Selector};

use super::{download_options, search_options};
use crate::cli::{FilterArgs, TransferArgs};
use crate::prompt::InteractiveSelector;
use crate::AppContext;

pub struct BatchRequest {
    pub queries: Vec<String>,
    pub out_dir: Option<PathBuf>,
    pub no_interactive: bool,
    pub select: Option<String>,
    pub select_ids: Vec<String>,
    pub concurrency: Option<usize>,
    pub yes: bool,
    pub filters: FilterArgs,
    pub transfer: TransferArgs,
}

enum Mode {
    Interactive(InteractiveSelector<std::io::StdinLock<'static>, std::io::Stdout>),
    Fixed(DeterministicSelector),
}

impl Mode {
    fn from_request(request: &BatchRequest) -> Result<Self> {
        if request.no_interactive {
            if request.select.is_none() && request.select_ids.is_empty() {
                bail!("--no-interactive needs --select or --select-id");
            }
            let indices = match &request.select {
                Some(spec) => parse_select_spec(spec)?,
                None => Vec::new(),
            };
            return Ok(Self::Fixed(DeterministicSelector::new(
                indices,
                request.select_ids.clone(),
            )));
        }

        if !std::io::stdin().is_terminal() {
            bail!("Interactive selection needs a terminal; use --no-interactive with --select");
        }
        Ok(Self::Interactive(InteractiveSelector::new(
            std::io::stdin().lock(),
            std::io::stdout(),
        )))
    }

    fn selector(&self) -> &dyn Selector {
        match self {
            Self::Interactive(s) => s,
            Self::Fixed(s) => s,
        }
    }
}

fn progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

pub async fn batch(ctx: &AppContext, request: BatchRequest) -> Result<i32> {
    let mode = Mode::from_request(&request)?;
    let options = search_options(ctx, &request.filters, None);
    let download = download_options(ctx, &request.transfer, false);
    let concurrency = request.concurrency.unwrap_or(ctx.config.concurrency);
    let out_root = request
        .out_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&ctx.config.save_dir));

    let cancel = CancellationFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, finishing downloads in progress");
                cancel.cancel();
            }
        });
    }

    let mut history = DownloadHistory::load(&ctx.config.history_file);
    let mut summary = BatchSummary::new();

    for query in &request.queries {
        if cancel.is_cancelled() {
            break;
        }

        let items = match search_items(ctx.index.as_ref(), query, &options).await {
            Ok(items) => items,
            Err(e) => {
                warn!(query = %query, error = %e, "Search failed");
                summary.record_failure(format!("{}: search failed: {}", query, e));
                continue;
            }
        };
        if items.is_empty() {
            println!("No results for {:?}", query);
            continue;
        }

        let selection = mode
            .selector()
            .select(query, &items)
            .context("Selection failed")?;
        if selection.is_empty() {
            info!(query = %query, "Nothing selected");
            continue;
        }

        let out_dir = out_root.join(sanitize_component(query, QUERY_DIR_MAX_LEN));
        if let Mode::Interactive(prompt) = &mode {
            let question = format!(
                "Download {} subtitle(s) to {}?",
                selection.len(),
                out_dir.display()
            );
            if !request.yes && !prompt.confirm(&question)? {
                continue;
            }
        }

        let bar = progress_bar(selection.len());
        bar.set_message(query.clone());
        let tick = bar.clone();
        let downloader = BatchDownloader::new(ctx.index.clone() as Arc<dyn subgrab_core::SubtitleIndex>, concurrency, download.clone())
            .with_cancellation(cancel.clone())
            .with_progress(Arc::new(move |p: BatchProgress| tick.set_position(p.completed as u64)));

        let report = downloader
            .run(query, &selection.candidates(), &out_dir)
            .await;
        bar.finish_and_clear();

        for saved in &report.saved {
            println!("Saved {}", saved.path.display());
            if let Err(e) = history.add(HistoryEntry::now(&saved.path, None)) {
                warn!(error = %e, "Failed to record download history");
            }
        }
        summary.record(&report);
    }

    println!("{}", summary.tally());
    for line in summary.display_errors() {
        eprintln!("  {}", line);
    }
    if summary.errors.len() > summary.display_errors().len() {
        eprintln!(
            "  ... and {} more",
            summary.errors.len() - summary.display_errors().len()
        );
    }
    Ok(summary.exit_code())
}

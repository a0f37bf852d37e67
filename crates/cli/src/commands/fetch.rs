//! `search` and `download`.

use anyhow::{Context, Result};
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

use subgrab_core::download::download_one;
use subgrab_core::history::{DownloadHistory, HistoryEntry};
use subgrab_core::searcher::search_items;
use subgrab_core::selector::{choose_one, SingleChoice};

use super::{download_options, search_options};
use crate::cli::{FilterArgs, TransferArgs};
use crate::output::{candidate_json, candidate_table, candidates_json};
use crate::AppContext;

pub async fn search(
    ctx: &AppContext,
    query: &str,
    filters: &FilterArgs,
    timeout: Option<f64>,
    json: bool,
) -> Result<i32> {
    let options = search_options(ctx, filters, timeout);
    let items = search_items(ctx.index.as_ref(), query, &options)
        .await
        .with_context(|| format!("Search failed for {:?}", query))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&candidates_json(&items))?);
    } else if items.is_empty() {
        println!("No results for {:?}", query);
    } else {
        print!("{}", candidate_table(&items));
    }

    Ok(if items.is_empty() { 2 } else { 0 })
}

pub struct DownloadRequest {
    pub query: String,
    pub out_dir: Option<PathBuf>,
    pub index: Option<usize>,
    pub id: Option<String>,
    pub no_best: bool,
    pub filters: FilterArgs,
    pub transfer: TransferArgs,
    pub overwrite: bool,
    pub json: bool,
}

impl DownloadRequest {
    fn choice(&self) -> SingleChoice {
        match (&self.id, self.index) {
            (Some(id), _) => SingleChoice::Id(id.clone()),
            (None, Some(i)) => SingleChoice::Index(i),
            (None, None) if self.no_best => SingleChoice::Nothing,
            (None, None) => SingleChoice::Best,
        }
    }
}

pub async fn download(ctx: &AppContext, request: DownloadRequest) -> Result<i32> {
    let options = search_options(ctx, &request.filters, None);
    let items = search_items(ctx.index.as_ref(), &request.query, &options)
        .await
        .with_context(|| format!("Search failed for {:?}", request.query))?;

    if items.is_empty() {
        if request.json {
            println!("{}", json!({"query": request.query, "saved": null, "reason": "no_results"}));
        } else {
            println!("No results for {:?}", request.query);
        }
        return Ok(2);
    }

    let Some(candidate) = choose_one(&items, &request.choice()) else {
        if request.json {
            println!("{}", json!({"query": request.query, "saved": null, "reason": "nothing_selected"}));
        } else {
            println!("Nothing selected");
        }
        return Ok(1);
    };

    let out_dir = request
        .out_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&ctx.config.save_dir));
    let download = download_options(ctx, &request.transfer, request.overwrite);
    let saved = download_one(ctx.index.as_ref(), candidate, &out_dir, &download)
        .await
        .with_context(|| format!("Failed to download {:?}", candidate.name))?;
    info!(path = %saved.display(), "Saved subtitle");

    let mut history = DownloadHistory::load(&ctx.config.history_file);
    if let Err(e) = history.add(HistoryEntry::now(&saved, None)) {
        warn!(error = %e, "Failed to record download history");
    }

    if request.json {
        let mut value = candidate_json(candidate);
        value["saved"] = json!(saved.display().to_string());
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("Saved {}", saved.display());
    }
    Ok(0)
}

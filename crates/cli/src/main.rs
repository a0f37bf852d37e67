mod cli;
mod commands;
mod output;
mod prompt;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subgrab_core::{load_config_or_default, validate_config, CompiledPatterns, Config, ThunderClient};

use cli::{Cli, Command};

/// Everything a command needs, built once from the configuration.
pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub patterns: CompiledPatterns,
    pub index: Arc<ThunderClient>,
}

impl AppContext {
    fn load(config_path: PathBuf) -> Result<Self> {
        let config = load_config_or_default(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?;
        validate_config(&config).context("Configuration validation failed")?;
        let patterns =
            CompiledPatterns::from_config(&config.patterns).context("Invalid pattern configuration")?;
        let index = Arc::new(ThunderClient::new(&config.api_base_url));

        Ok(Self {
            config,
            config_path,
            patterns,
            index,
        })
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let ctx = AppContext::load(cli.config)?;
    info!(config = %ctx.config_path.display(), "Configuration loaded");

    let result = dispatch(&ctx, cli.command).await;
    if cli.metrics {
        eprint!("{}", output::metrics_report());
    }
    result
}

async fn dispatch(ctx: &AppContext, command: Command) -> Result<i32> {
    match command {
        Command::Search {
            query,
            filters,
            timeout,
            json,
        } => commands::search(ctx, &query, &filters, timeout, json).await,
        Command::Download {
            query,
            out_dir,
            index,
            id,
            no_best,
            filters,
            transfer,
            overwrite,
            json,
        } => {
            let request = commands::DownloadRequest {
                query,
                out_dir,
                index,
                id,
                no_best,
                filters,
                transfer,
                overwrite,
                json,
            };
            commands::download(ctx, request).await
        }
        Command::Batch {
            queries,
            out_dir,
            no_interactive,
            select,
            select_ids,
            concurrency,
            yes,
            filters,
            transfer,
        } => {
            let request = commands::BatchRequest {
                queries,
                out_dir,
                no_interactive,
                select,
                select_ids,
                concurrency: concurrency.map(usize::from),
                yes,
                filters,
                transfer,
            };
            commands::batch(ctx, request).await
        }
        Command::Watch { dirs, out_dir, ai } => commands::watch(ctx, dirs, out_dir, ai).await,
        Command::Evaluate { file, ai } => commands::evaluate(ctx, &file, ai).await,
        Command::History { clear, json } => commands::history(ctx, clear, json),
        Command::Episodes { dir, output } => commands::episodes(ctx, &dir, output.as_deref()),
        Command::Config { action } => commands::config(ctx, action),
    }
}

//! `watch`: run the directory watcher until interrupted.

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use subgrab_core::evaluator::create_evaluator;
use subgrab_core::history::DownloadHistory;
use subgrab_core::pipeline::SubtitlePipeline;
use subgrab_core::watcher::{
    watch_directories_from_config, DirectoryWatcher, EventStatus, WatchDirectory, WatcherEvent,
    WatcherSettings,
};

use crate::AppContext;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_event(event: &WatcherEvent) {
    match event.status {
        EventStatus::Error => eprintln!("[{}] {}", event.timestamp, event.message),
        _ => println!("[{}] {}", event.timestamp, event.message),
    }
}

pub async fn watch(
    ctx: &AppContext,
    extra_dirs: Vec<PathBuf>,
    out_dir: Option<PathBuf>,
    ai: bool,
) -> Result<i32> {
    let settings = &ctx.config.directory_watcher;
    let mut directories = watch_directories_from_config(settings);
    let extra_output = out_dir
        .map(|d| d.display().to_string())
        .unwrap_or_else(|| settings.default_output_dir.clone());
    directories.extend(extra_dirs.into_iter().map(|dir| {
        WatchDirectory::new(dir)
            .with_file_types(settings.default_file_types.clone())
            .with_output_dir(extra_output.clone())
            .with_ai(ai || settings.use_ai_by_default)
    }));

    let evaluator = create_evaluator(&ctx.config.ai_evaluator, &ctx.patterns);
    if directories.iter().any(|d| d.use_ai) && !evaluator.is_available() {
        warn!("Quality evaluation is unavailable, ranking by file name only");
    }
    let history = Arc::new(Mutex::new(DownloadHistory::load(&ctx.config.history_file)));
    let pipeline = SubtitlePipeline::new(
        ctx.index.clone() as Arc<dyn subgrab_core::SubtitleIndex>,
        ctx.config.clone(),
        evaluator,
        ctx.patterns.clone(),
    )
    .with_history(history);

    let watcher = DirectoryWatcher::new(Arc::new(pipeline), WatcherSettings::from(settings));
    if !watcher.is_available() {
        bail!("File system notifications are not available on this system");
    }
    watcher.set_event_listener(Arc::new(|event: &WatcherEvent| print_event(event)));

    for dir in directories {
        let path = dir.path.clone();
        if let Err(e) = watcher.add_watch_directory(dir) {
            warn!(path = %path.display(), error = %e, "Skipping watch directory");
        }
    }
    if watcher.watch_directories().is_empty() {
        bail!("No watch directories; configure directory_watcher.watch_directories or pass directories");
    }

    watcher.start()?;
    info!(
        directories = watcher.watch_directories().len(),
        "Watching for new videos, press Ctrl-C to stop"
    );

    shutdown_signal().await;
    watcher.stop();
    Ok(0)
}

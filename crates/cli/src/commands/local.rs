//! Commands that need no index access: `evaluate`, `history`, `episodes`
//! and `config`.

use anyhow::{Context, Result};
use std::path::Path;

use subgrab_core::episodes::{list_episode_files, write_episode_list};
use subgrab_core::evaluator::{
    create_ai_evaluator, create_evaluator, decode_subtitle_bytes, detect_subtitle_format,
};
use subgrab_core::history::DownloadHistory;
use subgrab_core::SanitizedConfig;

use crate::cli::ConfigAction;
use crate::output::history_table;
use crate::AppContext;

/// Format hint for a local file: its extension when it names a subtitle
/// format, otherwise sniffed from the content.
fn format_hint(path: &Path, bytes: &[u8]) -> String {
    match path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase()) {
        Some(ext) if matches!(ext.as_str(), "srt" | "ass" | "ssa" | "vtt") => ext,
        _ => detect_subtitle_format(bytes).to_string(),
    }
}

pub async fn evaluate(ctx: &AppContext, file: &Path, ai: bool) -> Result<i32> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {:?}", file))?;
    let evaluator = if ai {
        create_ai_evaluator(&ctx.config.ai_evaluator, &ctx.patterns)
    } else {
        create_evaluator(&ctx.config.ai_evaluator, &ctx.patterns)
    };

    let result = evaluator
        .evaluate(&decode_subtitle_bytes(&bytes), &format_hint(file, &bytes))
        .await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(if result.available { 0 } else { 1 })
}

pub fn history(ctx: &AppContext, clear: bool, json: bool) -> Result<i32> {
    let mut history = DownloadHistory::load(&ctx.config.history_file);
    if clear {
        history.clear().context("Failed to clear history")?;
        println!("History cleared");
        return Ok(0);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(history.entries())?);
    } else if history.entries().is_empty() {
        println!("No downloads yet");
    } else {
        print!("{}", history_table(history.entries()));
    }
    Ok(0)
}

pub fn episodes(ctx: &AppContext, dir: &Path, output: Option<&Path>) -> Result<i32> {
    let names = list_episode_files(&ctx.patterns.episode, dir)
        .with_context(|| format!("Failed to list {:?}", dir))?;
    for name in &names {
        println!("{}", name);
    }
    if let Some(output) = output {
        write_episode_list(output, &names)
            .with_context(|| format!("Failed to write {:?}", output))?;
        eprintln!("Wrote {} episode(s) to {}", names.len(), output.display());
    }
    Ok(if names.is_empty() { 2 } else { 0 })
}

pub fn config(ctx: &AppContext, action: ConfigAction) -> Result<i32> {
    match action {
        ConfigAction::Show => {
            let sanitized = SanitizedConfig::from(&ctx.config);
            println!("{}", serde_json::to_string_pretty(&sanitized)?);
        }
        ConfigAction::Path => println!("{}", ctx.config_path.display()),
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use subgrab_core::history::HistoryEntry;
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> AppContext {
        let mut ctx = AppContext::load(dir.path().join("subgrab.json")).unwrap();
        ctx.config.history_file = dir.path().join("history.json");
        ctx
    }

    #[test]
    fn test_history_clear_empties_file() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let mut stored = DownloadHistory::load(&ctx.config.history_file);
        stored.add(HistoryEntry::now(Path::new("/subs/a.srt"), None)).unwrap();

        assert_eq!(history(&ctx, false, true).unwrap(), 0);
        assert_eq!(history(&ctx, true, false).unwrap(), 0);
        assert!(DownloadHistory::load(&ctx.config.history_file).entries().is_empty());
    }

    #[test]
    fn test_episodes_writes_sorted_list() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let videos = dir.path().join("videos");
        std::fs::create_dir(&videos).unwrap();
        for name in ["第0002话 乙.mp4", "第0001话 甲.mp4", "notes.txt"] {
            std::fs::write(videos.join(name), b"").unwrap();
        }
        let list = dir.path().join("out").join("episodes.txt");

        assert_eq!(episodes(&ctx, &videos, Some(&list)).unwrap(), 0);
        assert_eq!(
            std::fs::read_to_string(&list).unwrap(),
            "第0001话 甲.mp4\n第0002话 乙.mp4\n"
        );

        let empty = dir.path().join("empty");
        std::fs::create_dir(&empty).unwrap();
        assert_eq!(episodes(&ctx, &empty, None).unwrap(), 2);
    }

    #[test]
    fn test_format_hint_prefers_known_extension() {
        assert_eq!(format_hint(Path::new("a.ASS"), b"1\n"), "ass");
        assert_eq!(format_hint(Path::new("a.txt"), b"[Script Info]\n"), "ass");
        assert_eq!(format_hint(Path::new("noext"), b"1\n00:00:01,000"), "srt");
    }
}

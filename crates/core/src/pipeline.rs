//! Search, rank and download a subtitle for one video file.
//!
//! This is what the directory watcher runs for every new file. It can also
//! be driven directly for a single path.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{CompiledPatterns, Config};
use crate::download::{ensure_dir, fetch_with_retries, write_unique, RetryPolicy, UniqueNameStyle};
use crate::evaluator::{detect_subtitle_format, to_utf8_bytes, EvaluatorHandle};
use crate::history::{DownloadHistory, HistoryEntry, HistorySource};
use crate::metrics;
use crate::ranking::{CandidateRanker, RankOutcome};
use crate::searcher::SubtitleIndex;
use crate::watcher::{FileArrivalHandler, WatchDirectory};

/// Result of processing one video file.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Subtitle written to this path.
    Saved(PathBuf),
    /// The index returned nothing.
    NoResults,
    /// Results existed but none matched well enough.
    NoMatch,
    Failed(String),
}

impl PipelineOutcome {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Saved(_) => "saved",
            Self::NoResults => "no_results",
            Self::NoMatch => "no_match",
            Self::Failed(_) => "failed",
        }
    }
}

/// Subtitle name for a video: known site prefixes are dropped, a release
/// code is adopted when one is found (uppercased, `_` as `-`), otherwise
/// brackets are removed, whitespace collapsed and the extension dropped.
///
/// Never empty: when cleaning leaves nothing, the video's own stem is used.
pub fn subtitle_stem_for_video(name: &str, patterns: &CompiledPatterns) -> String {
    let mut clean = name.to_string();
    for prefix in &patterns.name_prefixes {
        clean = prefix.replace(&clean, "").into_owned();
    }

    for code in &patterns.name_codes {
        if let Some(m) = code.captures(&clean).and_then(|c| c.get(1)) {
            return m.as_str().to_uppercase().replace('_', "-");
        }
    }

    let without_brackets: String = clean
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '【' | '】'))
        .collect();
    let mut clean = without_brackets.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Some(dot) = clean.rfind('.') {
        clean.truncate(dot);
    }
    if clean.is_empty() {
        let stem = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.trim().is_empty());
        return stem.unwrap_or_else(|| name.to_string());
    }
    clean
}

/// Search → rank → download for arriving video files.
pub struct SubtitlePipeline {
    index: Arc<dyn SubtitleIndex>,
    config: Config,
    evaluator: EvaluatorHandle,
    patterns: CompiledPatterns,
    history: Option<Arc<Mutex<DownloadHistory>>>,
}

impl SubtitlePipeline {
    pub fn new(
        index: Arc<dyn SubtitleIndex>,
        config: Config,
        evaluator: EvaluatorHandle,
        patterns: CompiledPatterns,
    ) -> Self {
        Self {
            index,
            config,
            evaluator,
            patterns,
            history: None,
        }
    }

    /// Record saved files in `history`.
    pub fn with_history(mut self, history: Arc<Mutex<DownloadHistory>>) -> Self {
        self.history = Some(history);
        self
    }

    fn output_dir(&self, watch_dir: &WatchDirectory) -> PathBuf {
        watch_dir
            .output_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.watcher_output_dir())
    }

    /// Find and save the best subtitle for the video at `path`.
    pub async fn process_file(&self, path: &Path, watch_dir: &WatchDirectory) -> PipelineOutcome {
        let file_name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return PipelineOutcome::Failed(format!("not a file: {}", path.display())),
        };
        let query = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());

        let results = match self
            .index
            .search(&query, self.config.search_request_timeout())
            .await
        {
            Ok(results) => results,
            Err(e) => {
                warn!(query = %query, error = %e, "Search failed");
                return PipelineOutcome::Failed(e.to_string());
            }
        };
        if results.is_empty() {
            info!(query = %query, "No subtitles found");
            return PipelineOutcome::NoResults;
        }
        debug!(query = %query, count = results.len(), "Ranking candidates");

        let mut ranker = CandidateRanker::new(
            Arc::clone(&self.index),
            self.config.ranking.clone(),
            self.config.download_timeout(),
        );
        if watch_dir.use_ai {
            ranker = ranker.with_evaluator(Arc::clone(&self.evaluator));
        }
        let ranked = match ranker.rank(&file_name, &results).await {
            RankOutcome::Selected(ranked) => ranked,
            RankOutcome::NoMatch => {
                info!(file = %file_name, "No candidate matched");
                return PipelineOutcome::NoMatch;
            }
        };

        let bytes = match ranked.content {
            Some(bytes) => bytes,
            None => {
                let policy = RetryPolicy::new(self.config.retries);
                match fetch_with_retries(
                    self.index.as_ref(),
                    &ranked.candidate.url,
                    self.config.download_timeout(),
                    &policy,
                )
                .await
                {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        metrics::DOWNLOADS_FAILED.inc();
                        return PipelineOutcome::Failed(e.to_string());
                    }
                }
            }
        };

        let bytes = to_utf8_bytes(&bytes).into_owned();
        let ext = detect_subtitle_format(&bytes);
        let stem = subtitle_stem_for_video(&file_name, &self.patterns);
        let out_dir = self.output_dir(watch_dir);
        let target = out_dir.join(format!("{}.{}", stem, ext));

        let saved = tokio::task::spawn_blocking(move || {
            ensure_dir(&out_dir)?;
            write_unique(&target, &bytes, UniqueNameStyle::Underscore)
        })
        .await;
        let saved = match saved {
            Ok(Ok(saved)) => saved,
            Ok(Err(e)) => {
                metrics::DOWNLOADS_FAILED.inc();
                return PipelineOutcome::Failed(e.to_string());
            }
            Err(e) => return PipelineOutcome::Failed(format!("write task failed: {}", e)),
        };
        metrics::DOWNLOADS_COMPLETED.inc();
        info!(
            video = %file_name,
            subtitle = %ranked.candidate.name,
            path = %saved.display(),
            "Subtitle saved"
        );

        if let Some(history) = &self.history {
            let entry = HistoryEntry::now(&saved, Some(HistorySource::Watcher));
            if let Err(e) = history.lock().await.add(entry) {
                warn!(error = %e, "Failed to record download history");
            }
        }

        PipelineOutcome::Saved(saved)
    }
}

#[async_trait]
impl FileArrivalHandler for SubtitlePipeline {
    async fn on_file_arrived(&self, path: &Path, watch_dir: &WatchDirectory) -> PipelineOutcome {
        self.process_file(path, watch_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::UnavailableEvaluator;
    use crate::testing::{fixtures, MockEvaluator, MockSubtitleIndex};
    use tempfile::TempDir;

    fn patterns() -> CompiledPatterns {
        CompiledPatterns::default()
    }

    #[test]
    fn test_stem_strips_site_prefix_and_adopts_code() {
        let p = patterns();
        assert_eq!(subtitle_stem_for_video("hhd800.com@ABP_123", &p), "ABP-123");
        assert_eq!(subtitle_stem_for_video("[group]ssis-456 hd", &p), "SSIS-456");
    }

    #[test]
    fn test_stem_without_code() {
        let p = patterns();
        assert_eq!(subtitle_stem_for_video("【字幕】 我的  电影", &p), "我的 电影");
        assert_eq!(subtitle_stem_for_video("电影 第一部.final", &p), "电影 第一部");
        assert_eq!(subtitle_stem_for_video("电影 [导演剪辑]", &p), "电影 导演剪辑");
    }

    #[test]
    fn test_stem_falls_back_when_cleaning_leaves_nothing() {
        let p = patterns();
        assert_eq!(subtitle_stem_for_video("[tag].mkv", &p), "[tag]");
        assert_eq!(subtitle_stem_for_video("【字幕组】.mp4", &p), "【字幕组】");
        assert!(!subtitle_stem_for_video("[a] .avi", &p).is_empty());
    }

    struct Fixture {
        _dir: TempDir,
        video: PathBuf,
        out: PathBuf,
        index: Arc<MockSubtitleIndex>,
    }

    async fn fixture(video_name: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join(video_name);
        std::fs::write(&video, b"video").unwrap();
        let out = dir.path().join("subs");
        Fixture {
            _dir: dir,
            video,
            out,
            index: Arc::new(MockSubtitleIndex::new()),
        }
    }

    fn pipeline(index: Arc<MockSubtitleIndex>, evaluator: EvaluatorHandle) -> SubtitlePipeline {
        let mut config = Config::default();
        config.retries = 0;
        SubtitlePipeline::new(index, config, evaluator, patterns())
    }

    #[tokio::test]
    async fn test_filename_mode_saves_best_match() {
        let f = fixture("我的 电影 2020.mkv").await;
        f.index
            .set_results(vec![
                fixtures::candidate("a", "无关 字幕.srt"),
                fixtures::candidate("b", "我的 电影 2020.srt"),
            ])
            .await;
        f.index
            .set_content("https://subs.example/b", fixtures::srt(&["你好"]))
            .await;

        let history_path = f.out.join("history.json");
        let history = Arc::new(Mutex::new(DownloadHistory::load(&history_path)));
        let p = pipeline(Arc::clone(&f.index), Arc::new(UnavailableEvaluator::new("off")))
            .with_history(Arc::clone(&history));
        let wd = WatchDirectory::new("/unused").with_output_dir(f.out.display().to_string());

        let outcome = p.process_file(&f.video, &wd).await;
        let expected = f.out.join("我的 电影 2020.srt");
        assert_eq!(outcome, PipelineOutcome::Saved(expected.clone()));
        assert_eq!(std::fs::read(&expected).unwrap(), fixtures::srt(&["你好"]));
        assert_eq!(f.index.fetch_count("https://subs.example/a").await, 0);

        let history = history.lock().await;
        assert_eq!(history.entries()[0].source, Some(HistorySource::Watcher));
        assert_eq!(history.entries()[0].name, "我的 电影 2020.srt");
    }

    #[tokio::test]
    async fn test_existing_subtitle_is_not_overwritten() {
        let f = fixture("电影.mkv").await;
        f.index.set_results(vec![fixtures::candidate("a", "电影.srt")]).await;
        f.index
            .set_content("https://subs.example/a", fixtures::srt(&["新"]))
            .await;
        std::fs::create_dir_all(&f.out).unwrap();
        std::fs::write(f.out.join("电影.srt"), b"old").unwrap();

        let p = pipeline(Arc::clone(&f.index), Arc::new(UnavailableEvaluator::new("off")));
        let wd = WatchDirectory::new("/unused").with_output_dir(f.out.display().to_string());

        let outcome = p.process_file(&f.video, &wd).await;
        assert_eq!(outcome, PipelineOutcome::Saved(f.out.join("电影_1.srt")));
        assert_eq!(std::fs::read(f.out.join("电影.srt")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_no_results_and_no_match() {
        let f = fixture("电影.mkv").await;
        let p = pipeline(Arc::clone(&f.index), Arc::new(UnavailableEvaluator::new("off")));
        let wd = WatchDirectory::new("/unused").with_output_dir(f.out.display().to_string());

        assert_eq!(p.process_file(&f.video, &wd).await, PipelineOutcome::NoResults);

        f.index
            .set_results(vec![fixtures::candidate("a", "完全 不同")])
            .await;
        assert_eq!(p.process_file(&f.video, &wd).await, PipelineOutcome::NoMatch);
        assert!(!f.out.exists());
    }

    #[tokio::test]
    async fn test_ai_mode_prefers_quality_and_reuses_content() {
        let f = fixture("电影 2020.mkv").await;
        f.index
            .set_results(vec![
                fixtures::candidate("a", "电影 2020.srt"),
                fixtures::candidate("b", "电影 2020 x.srt"),
            ])
            .await;
        let poor = fixtures::srt(&["机翻"]);
        let good = fixtures::srt(&["人工翻译"]);
        f.index.set_content("https://subs.example/a", poor.clone()).await;
        f.index.set_content("https://subs.example/b", good.clone()).await;

        let evaluator = Arc::new(MockEvaluator::new());
        evaluator
            .set_score(&String::from_utf8_lossy(&poor), 10.0)
            .await;
        evaluator
            .set_score(&String::from_utf8_lossy(&good), 95.0)
            .await;

        let p = pipeline(Arc::clone(&f.index), evaluator);
        let wd = WatchDirectory::new("/unused")
            .with_output_dir(f.out.display().to_string())
            .with_ai(true);

        let outcome = p.process_file(&f.video, &wd).await;
        assert_eq!(outcome, PipelineOutcome::Saved(f.out.join("电影 2020.srt")));
        assert_eq!(std::fs::read(f.out.join("电影 2020.srt")).unwrap(), good);
        assert_eq!(f.index.fetch_count("https://subs.example/b").await, 1);
    }

    #[tokio::test]
    async fn test_gbk_subtitle_is_saved_as_utf8() {
        let f = fixture("电影.mkv").await;
        f.index.set_results(vec![fixtures::candidate("a", "电影.srt")]).await;
        let utf8 = fixtures::srt(&["你好，世界。"]);
        let (gbk, _, _) = encoding_rs::GBK.encode(std::str::from_utf8(&utf8).unwrap());
        f.index
            .set_content("https://subs.example/a", gbk.into_owned())
            .await;

        let p = pipeline(Arc::clone(&f.index), Arc::new(UnavailableEvaluator::new("off")));
        let wd = WatchDirectory::new("/unused").with_output_dir(f.out.display().to_string());

        let outcome = p.process_file(&f.video, &wd).await;
        assert_eq!(outcome, PipelineOutcome::Saved(f.out.join("电影.srt")));
        assert_eq!(std::fs::read(f.out.join("电影.srt")).unwrap(), utf8);
    }

    #[tokio::test]
    async fn test_search_failure_is_reported() {
        let f = fixture("电影.mkv").await;
        f.index
            .fail_next_search(crate::searcher::RemoteError::Connection("refused".into()))
            .await;
        let p = pipeline(Arc::clone(&f.index), Arc::new(UnavailableEvaluator::new("off")));

        let outcome = p.process_file(&f.video, &WatchDirectory::new("/unused")).await;
        assert!(matches!(outcome, PipelineOutcome::Failed(m) if m.contains("refused")));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(PipelineOutcome::Saved(PathBuf::new()).label(), "saved");
        assert_eq!(PipelineOutcome::NoResults.label(), "no_results");
        assert_eq!(PipelineOutcome::Failed(String::new()).label(), "failed");
    }
}

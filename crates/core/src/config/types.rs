use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

use crate::watcher::WatchDirectory;

/// Root configuration, persisted as a JSON object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Last directory browsed for videos.
    #[serde(default)]
    pub video_dir: String,
    /// Default destination for downloaded subtitles.
    #[serde(default = "default_save_dir")]
    pub save_dir: String,
    /// Minimum server relevance score a candidate must reach.
    #[serde(default)]
    pub min_score: f64,
    /// Language tag filter; empty means any language.
    #[serde(default)]
    pub language: String,
    /// Download timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    /// Retries per download after the first attempt.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Maximum concurrent downloads in a batch.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Search request timeout in seconds.
    #[serde(default = "default_search_timeout")]
    pub search_timeout: f64,
    /// Base URL of the subtitle index.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,
    /// Location of the download history file.
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
    #[serde(default)]
    pub ai_evaluator: AiEvaluatorConfig,
    #[serde(default)]
    pub directory_watcher: DirectoryWatcherConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub patterns: PatternConfig,
    /// Keys this version does not know about, kept so saving does not drop them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            video_dir: String::new(),
            save_dir: default_save_dir(),
            min_score: 0.0,
            language: String::new(),
            timeout: default_timeout(),
            retries: default_retries(),
            concurrency: default_concurrency(),
            search_timeout: default_search_timeout(),
            api_base_url: default_api_base_url(),
            video_extensions: default_video_extensions(),
            history_file: default_history_file(),
            ai_evaluator: AiEvaluatorConfig::default(),
            directory_watcher: DirectoryWatcherConfig::default(),
            ranking: RankingConfig::default(),
            patterns: PatternConfig::default(),
            extra: Map::new(),
        }
    }
}

impl Config {
    /// Per-attempt download timeout.
    pub fn download_timeout(&self) -> Duration {
        seconds(self.timeout)
    }

    pub fn search_request_timeout(&self) -> Duration {
        seconds(self.search_timeout)
    }

    /// Output directory for watcher downloads without their own override.
    pub fn watcher_output_dir(&self) -> PathBuf {
        [&self.directory_watcher.default_output_dir, &self.save_dir]
            .into_iter()
            .map(|d| d.trim())
            .find(|d| !d.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(default_save_dir()))
    }
}

/// Seconds as a duration; negative and non-finite values become zero.
pub fn seconds(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

fn default_save_dir() -> String {
    "./subtitles".to_string()
}

fn default_timeout() -> f64 {
    60.0
}

fn default_retries() -> u32 {
    2
}

fn default_concurrency() -> usize {
    3
}

fn default_search_timeout() -> f64 {
    20.0
}

fn default_api_base_url() -> String {
    "https://api-shoulei-ssl.xunlei.com".to_string()
}

fn default_video_extensions() -> Vec<String> {
    [".mp4", ".mkv", ".avi", ".mov", ".wmv", ".flv", ".webm", ".m4v"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_history_file() -> PathBuf {
    PathBuf::from("download_history.json")
}

/// LLM-backed quality evaluator settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AiEvaluatorConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    /// OpenAI-compatible API base (e.g., "https://api.deepseek.com")
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
    /// Request timeout in seconds.
    #[serde(default = "default_ai_timeout")]
    pub timeout: f64,
}

impl Default for AiEvaluatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            base_url: default_ai_base_url(),
            model: default_ai_model(),
            timeout: default_ai_timeout(),
        }
    }
}

fn default_ai_base_url() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_ai_model() -> String {
    "deepseek-chat".to_string()
}

fn default_ai_timeout() -> f64 {
    30.0
}

/// Directory watcher settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoryWatcherConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub watch_directories: Vec<WatchDirectory>,
    /// Output directory for entries that do not set their own.
    #[serde(default)]
    pub default_output_dir: String,
    #[serde(default = "default_watch_file_types")]
    pub default_file_types: Vec<String>,
    #[serde(default)]
    pub use_ai_by_default: bool,
    /// Delay after a create event before probing the file.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Interval between readiness checks.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Give up on a file that stays unreadable this long.
    #[serde(default = "default_readiness_timeout_secs")]
    pub readiness_timeout_secs: u64,
}

impl Default for DirectoryWatcherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            watch_directories: Vec::new(),
            default_output_dir: String::new(),
            default_file_types: default_watch_file_types(),
            use_ai_by_default: false,
            settle_delay_ms: default_settle_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            readiness_timeout_secs: default_readiness_timeout_secs(),
        }
    }
}

pub fn default_watch_file_types() -> Vec<String> {
    [
        ".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm", ".m4v", ".rmvb", ".rm",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_settle_delay_ms() -> u64 {
    2000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_readiness_timeout_secs() -> u64 {
    300
}

/// Candidate ranking weights.
///
/// The 0.4/0.6 split is kept for compatibility with existing setups; it is
/// a tunable, not a derived value.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RankingConfig {
    #[serde(default = "default_filename_weight")]
    pub filename_weight: f64,
    #[serde(default = "default_quality_weight")]
    pub quality_weight: f64,
    /// Candidates evaluated concurrently per round.
    #[serde(default = "default_evaluation_batch_size")]
    pub evaluation_batch_size: usize,
    /// Fetch retries when pulling candidate content for evaluation.
    #[serde(default = "default_evaluation_fetch_retries")]
    pub evaluation_fetch_retries: u32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            filename_weight: default_filename_weight(),
            quality_weight: default_quality_weight(),
            evaluation_batch_size: default_evaluation_batch_size(),
            evaluation_fetch_retries: default_evaluation_fetch_retries(),
        }
    }
}

fn default_filename_weight() -> f64 {
    0.4
}

fn default_quality_weight() -> f64 {
    0.6
}

fn default_evaluation_batch_size() -> usize {
    5
}

fn default_evaluation_fetch_retries() -> u32 {
    1
}

/// Heuristic pattern lists. These are seeds and can be extended freely.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatternConfig {
    /// Regexes (case-insensitive) marking advertisement/watermark junk.
    #[serde(default = "default_invalid_content")]
    pub invalid_content: Vec<String>,
    /// Literal phrases that read as unnatural translations.
    #[serde(default = "default_unnatural_phrases")]
    pub unnatural_phrases: Vec<String>,
    /// Literal pronoun spam sequences.
    #[serde(default = "default_repeated_pronouns")]
    pub repeated_pronouns: Vec<String>,
    /// Regexes stripped from the start of a video name.
    #[serde(default = "default_name_prefixes")]
    pub name_prefixes: Vec<String>,
    /// Regexes whose first capture group is adopted as the subtitle name.
    #[serde(default = "default_name_codes")]
    pub name_codes: Vec<String>,
    /// Episode file pattern; capture group 1 is the episode number.
    #[serde(default = "default_episode_pattern")]
    pub episode: String,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            invalid_content: default_invalid_content(),
            unnatural_phrases: default_unnatural_phrases(),
            repeated_pronouns: default_repeated_pronouns(),
            name_prefixes: default_name_prefixes(),
            name_codes: default_name_codes(),
            episode: default_episode_pattern(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_invalid_content() -> Vec<String> {
    strings(&[
        r"第一会所",
        r"sis001\.com",
        r"BT压片组",
        r"getsisurl@gmail\.com",
        r"云的守望",
        r"压制组",
        r"字幕组.*广告",
        r"www\.[a-z0-9]+\.com",
    ])
}

fn default_unnatural_phrases() -> Vec<String> {
    strings(&["打开灯", "关闭灯", "这是非常", "那是非常", "在这一点上"])
}

fn default_repeated_pronouns() -> Vec<String> {
    strings(&["我我我", "你你你", "他他他"])
}

fn default_name_prefixes() -> Vec<String> {
    strings(&[
        r"^hhd800\.com@",
        r"^hhd800@",
        r"^www\.[^@]+@",
        r"^[a-z0-9\-\.]+\.(com|net|org|cc|tv)@",
        r"^\[[^\]]+\]",
        r"^【[^】]+】",
    ])
}

fn default_name_codes() -> Vec<String> {
    strings(&[r"([A-Z]{2,6}[-_]\d{2,4})", r"([A-Z]{2,6}\d{2,4})"])
}

fn default_episode_pattern() -> String {
    r"^第(\d{4})话\s+.*\.mp4$".to_string()
}

/// Sanitized config for display (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub video_dir: String,
    pub save_dir: String,
    pub min_score: f64,
    pub language: String,
    pub timeout: f64,
    pub retries: u32,
    pub concurrency: usize,
    pub search_timeout: f64,
    pub api_base_url: String,
    pub history_file: PathBuf,
    pub ai_evaluator: SanitizedAiEvaluatorConfig,
    pub directory_watcher: DirectoryWatcherConfig,
    pub ranking: RankingConfig,
}

/// AI evaluator config with the API key hidden.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAiEvaluatorConfig {
    pub enabled: bool,
    pub api_key_configured: bool,
    pub base_url: String,
    pub model: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            video_dir: config.video_dir.clone(),
            save_dir: config.save_dir.clone(),
            min_score: config.min_score,
            language: config.language.clone(),
            timeout: config.timeout,
            retries: config.retries,
            concurrency: config.concurrency,
            search_timeout: config.search_timeout,
            api_base_url: config.api_base_url.clone(),
            history_file: config.history_file.clone(),
            ai_evaluator: SanitizedAiEvaluatorConfig {
                enabled: config.ai_evaluator.enabled,
                api_key_configured: !config.ai_evaluator.api_key.is_empty(),
                base_url: config.ai_evaluator.base_url.clone(),
                model: config.ai_evaluator.model.clone(),
            },
            directory_watcher: config.directory_watcher.clone(),
            ranking: config.ranking.clone(),
        }
    }
}

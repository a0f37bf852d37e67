pub mod config;
pub mod download;
pub mod episodes;
pub mod evaluator;
pub mod history;
pub mod metrics;
pub mod pipeline;
pub mod ranking;
pub mod searcher;
pub mod selector;
pub mod testing;
pub mod watcher;

pub use config::{
    load_config, load_config_from_str, load_config_or_default, save_config, validate_config,
    CompiledPatterns, Config, ConfigError, SanitizedConfig,
};
pub use download::{BatchDownloader, BatchSummary, CancellationFlag, DownloadError, DownloadOptions};
pub use evaluator::{create_ai_evaluator, create_evaluator, EvaluationResult, EvaluatorHandle, QualityEvaluator};
pub use history::{DownloadHistory, HistoryEntry, HistorySource};
pub use pipeline::{PipelineOutcome, SubtitlePipeline};
pub use ranking::{CandidateRanker, RankOutcome};
pub use searcher::{Candidate, RemoteError, SubtitleIndex, ThunderClient};
pub use selector::{DeterministicSelector, Selection, Selector};
pub use watcher::{DirectoryWatcher, WatchDirectory};

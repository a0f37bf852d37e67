//! Picks the best candidate for a source file.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::RankingConfig;
use crate::download::{fetch_with_retries, RetryPolicy};
use crate::evaluator::{decode_subtitle_bytes, EvaluationResult, EvaluatorHandle};
use crate::searcher::{Candidate, SubtitleIndex};

use super::filename_similarity;

/// A chosen candidate with the scores that selected it.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    /// Filename similarity, 0-100.
    pub filename_score: f64,
    /// Quality evaluation when the AI-assisted mode picked this candidate.
    pub evaluation: Option<EvaluationResult>,
    /// Score the pick was made on.
    pub final_score: f64,
    /// Content fetched during evaluation, reused by the caller.
    pub content: Option<Vec<u8>>,
}

impl RankedCandidate {
    pub fn quality_score(&self) -> Option<f64> {
        self.evaluation.as_ref().map(|e| e.overall_score)
    }
}

/// Result of ranking.
#[derive(Debug, Clone)]
pub enum RankOutcome {
    Selected(RankedCandidate),
    /// No candidate had a usable filename match or evaluation.
    NoMatch,
}

impl RankOutcome {
    pub fn selected(&self) -> Option<&RankedCandidate> {
        match self {
            Self::Selected(ranked) => Some(ranked),
            Self::NoMatch => None,
        }
    }
}

/// Pick the candidate whose name best matches `source_name`.
///
/// Candidates scoring 0 are skipped; on equal scores the earlier one wins.
pub fn rank_by_filename(source_name: &str, candidates: &[Candidate]) -> RankOutcome {
    let mut best: Option<(f64, &Candidate)> = None;
    for candidate in candidates {
        let score = filename_similarity(source_name, &candidate.name);
        if score <= 0.0 {
            continue;
        }
        if best.map_or(true, |(top, _)| score > top) {
            best = Some((score, candidate));
        }
    }

    match best {
        Some((score, candidate)) => RankOutcome::Selected(RankedCandidate {
            candidate: candidate.clone(),
            filename_score: score,
            evaluation: None,
            final_score: score,
            content: None,
        }),
        None => RankOutcome::NoMatch,
    }
}

/// Combines filename similarity with quality evaluation.
///
/// Without an available evaluator only filename similarity is used. With
/// one, every candidate with a nonzero filename score is fetched and
/// evaluated, `evaluation_batch_size` at a time, and the highest
/// `filename * filename_weight + quality * quality_weight` wins. Candidates
/// whose fetch or evaluation fails are dropped.
pub struct CandidateRanker {
    index: Arc<dyn SubtitleIndex>,
    evaluator: Option<EvaluatorHandle>,
    config: RankingConfig,
    fetch_timeout: Duration,
    fetch_policy: RetryPolicy,
}

impl CandidateRanker {
    pub fn new(index: Arc<dyn SubtitleIndex>, config: RankingConfig, fetch_timeout: Duration) -> Self {
        let fetch_policy = RetryPolicy::new(config.evaluation_fetch_retries);
        Self {
            index,
            evaluator: None,
            config,
            fetch_timeout,
            fetch_policy,
        }
    }

    /// Use `evaluator` for AI-assisted ranking. An unavailable evaluator is
    /// ignored and the ranker stays in filename-only mode.
    pub fn with_evaluator(mut self, evaluator: EvaluatorHandle) -> Self {
        if evaluator.is_available() {
            self.evaluator = Some(evaluator);
        } else {
            debug!(evaluator = evaluator.name(), "Evaluator unavailable, ranking by filename only");
        }
        self
    }

    pub fn with_fetch_policy(mut self, policy: RetryPolicy) -> Self {
        self.fetch_policy = policy;
        self
    }

    pub fn is_ai_assisted(&self) -> bool {
        self.evaluator.is_some()
    }

    pub async fn rank(&self, source_name: &str, candidates: &[Candidate]) -> RankOutcome {
        match &self.evaluator {
            Some(evaluator) => self.rank_with_evaluator(evaluator, source_name, candidates).await,
            None => rank_by_filename(source_name, candidates),
        }
    }

    async fn rank_with_evaluator(
        &self,
        evaluator: &EvaluatorHandle,
        source_name: &str,
        candidates: &[Candidate],
    ) -> RankOutcome {
        let matching: Vec<(&Candidate, f64)> = candidates
            .iter()
            .map(|c| (c, filename_similarity(source_name, &c.name)))
            .filter(|(c, score)| {
                if *score <= 0.0 {
                    debug!(name = %c.name, "Skipping candidate with no filename match");
                }
                *score > 0.0
            })
            .collect();

        let batch_size = self.config.evaluation_batch_size.max(1);
        let mut scored: Vec<RankedCandidate> = Vec::new();
        for batch in matching.chunks(batch_size) {
            let results = join_all(
                batch
                    .iter()
                    .map(|(candidate, score)| self.evaluate_one(evaluator, candidate, *score)),
            )
            .await;
            scored.extend(results.into_iter().flatten());
        }

        let mut best: Option<RankedCandidate> = None;
        for ranked in scored {
            if best.as_ref().map_or(true, |b| ranked.final_score > b.final_score) {
                best = Some(ranked);
            }
        }

        match best {
            Some(ranked) => {
                info!(
                    source = %source_name,
                    name = %ranked.candidate.name,
                    filename_score = ranked.filename_score,
                    quality_score = ?ranked.quality_score(),
                    final_score = ranked.final_score,
                    "Selected candidate"
                );
                RankOutcome::Selected(ranked)
            }
            None => RankOutcome::NoMatch,
        }
    }

    async fn evaluate_one(
        &self,
        evaluator: &EvaluatorHandle,
        candidate: &Candidate,
        filename_score: f64,
    ) -> Option<RankedCandidate> {
        let bytes = match fetch_with_retries(
            self.index.as_ref(),
            &candidate.url,
            self.fetch_timeout,
            &self.fetch_policy,
        )
        .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(name = %candidate.name, error = %e, "Dropping candidate, fetch failed");
                return None;
            }
        };

        let format_hint = if candidate.ext.is_empty() {
            "srt"
        } else {
            candidate.ext.as_str()
        };
        let evaluation = evaluator
            .evaluate(&decode_subtitle_bytes(&bytes), format_hint)
            .await;
        if !evaluation.available {
            debug!(
                name = %candidate.name,
                reason = evaluation.error.as_deref().unwrap_or(""),
                "Dropping candidate, evaluation unavailable"
            );
            return None;
        }

        let final_score = filename_score * self.config.filename_weight
            + evaluation.overall_score * self.config.quality_weight;
        debug!(
            name = %candidate.name,
            filename_score,
            quality_score = evaluation.overall_score,
            final_score,
            "Evaluated candidate"
        );

        Some(RankedCandidate {
            candidate: candidate.clone(),
            filename_score,
            evaluation: Some(evaluation),
            final_score,
            content: Some(bytes),
        })
    }
}

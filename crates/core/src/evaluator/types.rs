//! Types for subtitle quality evaluation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of evaluating one subtitle.
///
/// Sub-scores are on a 0-10 scale, `overall_score` on 0-100. When
/// `available` is false the scores are zero and `error` says why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub available: bool,
    pub fluency: f64,
    pub accuracy: f64,
    pub localization: f64,
    pub professionalism: f64,
    pub overall_score: f64,
    pub is_machine_translation: bool,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub issues: Vec<String>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Time spent in the evaluator, milliseconds.
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl EvaluationResult {
    /// An unavailable result carrying `reason` as summary and error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            available: false,
            fluency: 0.0,
            accuracy: 0.0,
            localization: 0.0,
            professionalism: 0.0,
            overall_score: 0.0,
            is_machine_translation: false,
            confidence: 0.0,
            issues: Vec::new(),
            summary: reason.clone(),
            error: Some(reason),
            elapsed_ms: 0,
        }
    }

    pub fn with_issues(mut self, issues: Vec<String>) -> Self {
        self.issues = issues;
        self
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }
}

/// Scores subtitle content quality.
///
/// Implementations never fail: problems are reported as an unavailable
/// [`EvaluationResult`].
#[async_trait]
pub trait QualityEvaluator: Send + Sync {
    /// Evaluator name for logging.
    fn name(&self) -> &str;

    /// Whether evaluations can produce scores at all.
    fn is_available(&self) -> bool;

    /// Evaluate raw subtitle content. `format_hint` is an extension such as
    /// "srt" or "ass" and selects how dialogue text is extracted.
    async fn evaluate(&self, content: &str, format_hint: &str) -> EvaluationResult;
}

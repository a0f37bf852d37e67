//! Mock quality evaluator for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::evaluator::{EvaluationResult, QualityEvaluator};

/// A recorded evaluation for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedEvaluation {
    pub content: String,
    pub format_hint: String,
}

/// Mock implementation of the QualityEvaluator trait.
///
/// Scores are looked up by exact content; anything else gets the default
/// score. Content marked as failing yields an unavailable result.
#[derive(Debug)]
pub struct MockEvaluator {
    available: AtomicBool,
    default_score: Arc<RwLock<f64>>,
    scores: Arc<RwLock<HashMap<String, f64>>>,
    failing: Arc<RwLock<Vec<String>>>,
    evaluations: Arc<RwLock<Vec<RecordedEvaluation>>>,
}

impl Default for MockEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEvaluator {
    /// Create an available evaluator scoring everything 70.
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            default_score: Arc::new(RwLock::new(70.0)),
            scores: Arc::new(RwLock::new(HashMap::new())),
            failing: Arc::new(RwLock::new(Vec::new())),
            evaluations: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Create an evaluator that reports itself unavailable.
    pub fn unavailable() -> Self {
        let evaluator = Self::new();
        evaluator.available.store(false, Ordering::SeqCst);
        evaluator
    }

    /// Overall score for one exact content string.
    pub async fn set_score(&self, content: &str, overall_score: f64) {
        self.scores
            .write()
            .await
            .insert(content.to_string(), overall_score);
    }

    /// Overall score for content without a specific entry.
    pub async fn set_default_score(&self, overall_score: f64) {
        *self.default_score.write().await = overall_score;
    }

    /// Return an unavailable result for this content.
    pub async fn fail_for(&self, content: &str) {
        self.failing.write().await.push(content.to_string());
    }

    /// Get recorded evaluations.
    pub async fn recorded_evaluations(&self) -> Vec<RecordedEvaluation> {
        self.evaluations.read().await.clone()
    }

    /// Get the number of evaluations performed.
    pub async fn evaluation_count(&self) -> usize {
        self.evaluations.read().await.len()
    }
}

#[async_trait]
impl QualityEvaluator for MockEvaluator {
    fn name(&self) -> &str {
        "mock"
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn evaluate(&self, content: &str, format_hint: &str) -> EvaluationResult {
        self.evaluations.write().await.push(RecordedEvaluation {
            content: content.to_string(),
            format_hint: format_hint.to_string(),
        });

        if !self.is_available() {
            return EvaluationResult::unavailable("mock evaluator unavailable");
        }
        if self.failing.read().await.iter().any(|c| c == content) {
            return EvaluationResult::unavailable("mock evaluation failed");
        }

        let overall_score = match self.scores.read().await.get(content) {
            Some(score) => *score,
            None => *self.default_score.read().await,
        };
        let sub_score = overall_score / 10.0;

        EvaluationResult {
            available: true,
            fluency: sub_score,
            accuracy: sub_score,
            localization: sub_score,
            professionalism: sub_score,
            overall_score,
            is_machine_translation: overall_score < 60.0,
            confidence: 1.0,
            issues: Vec::new(),
            summary: "mock".to_string(),
            error: None,
            elapsed_ms: 0,
        }
    }
}

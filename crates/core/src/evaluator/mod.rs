//! Subtitle quality evaluation.
//!
//! Two interchangeable implementations sit behind [`QualityEvaluator`]: a
//! rule-based scorer that needs no network access and an LLM-backed scorer.
//! Which one runs is decided once, by [`create_evaluator`].

mod ai;
mod llm;
mod rules;
mod text;
mod types;

pub use ai::{LlmEvaluator, PROMPT_TEXT_CHARS};
pub use llm::{CompletionRequest, LlmClient, LlmError, OpenAiCompatibleClient};
pub use rules::{RuleBasedEvaluator, MIN_TEXT_CHARS};
pub use text::{
    decode_subtitle_bytes, detect_subtitle_format, extract_text, extract_text_from_ass,
    extract_text_from_srt, to_utf8_bytes,
};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{seconds, AiEvaluatorConfig, CompiledPatterns};

/// Shared evaluator chosen at startup.
pub type EvaluatorHandle = Arc<dyn QualityEvaluator>;

/// Stand-in used when AI evaluation is requested but cannot run.
#[derive(Debug, Clone)]
pub struct UnavailableEvaluator {
    reason: String,
}

impl UnavailableEvaluator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait]
impl QualityEvaluator for UnavailableEvaluator {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn evaluate(&self, _content: &str, _format_hint: &str) -> EvaluationResult {
        EvaluationResult::unavailable(self.reason.clone())
    }
}

/// Factory function to create the evaluator from config.
pub fn create_evaluator(config: &AiEvaluatorConfig, patterns: &CompiledPatterns) -> EvaluatorHandle {
    if !config.enabled {
        return Arc::new(RuleBasedEvaluator::new(patterns));
    }

    match config.api_key.trim() {
        "" => Arc::new(UnavailableEvaluator::new(
            "AI evaluation enabled but no API key configured",
        )),
        key => create_llm_evaluator(config, key, patterns),
    }
}

/// Build the LLM evaluator regardless of the `enabled` flag, as long as a
/// key is present.
pub fn create_ai_evaluator(config: &AiEvaluatorConfig, patterns: &CompiledPatterns) -> EvaluatorHandle {
    match config.api_key.trim() {
        "" => Arc::new(UnavailableEvaluator::new("no API key configured")),
        key => create_llm_evaluator(config, key, patterns),
    }
}

fn create_llm_evaluator(
    config: &AiEvaluatorConfig,
    api_key: &str,
    patterns: &CompiledPatterns,
) -> EvaluatorHandle {
    let client = OpenAiCompatibleClient::new(&config.base_url, api_key, &config.model)
        .with_timeout(seconds(config.timeout));
    Arc::new(LlmEvaluator::new(Arc::new(client), patterns))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ai_config(enabled: bool, api_key: &str) -> AiEvaluatorConfig {
        AiEvaluatorConfig {
            enabled,
            api_key: api_key.to_string(),
            ..AiEvaluatorConfig::default()
        }
    }

    #[test]
    fn test_create_evaluator_disabled_is_rules() {
        let evaluator = create_evaluator(&ai_config(false, "sk"), &CompiledPatterns::default());
        assert_eq!(evaluator.name(), "rules");
        assert!(evaluator.is_available());
    }

    #[test]
    fn test_create_evaluator_enabled_with_key_is_llm() {
        let evaluator = create_evaluator(&ai_config(true, "sk-1"), &CompiledPatterns::default());
        assert_eq!(evaluator.name(), "llm");
        assert!(evaluator.is_available());
    }

    #[test]
    fn test_create_evaluator_enabled_without_key_is_unavailable() {
        for key in ["", "   "] {
            let evaluator = create_evaluator(&ai_config(true, key), &CompiledPatterns::default());
            assert_eq!(evaluator.name(), "unavailable");
            assert!(!evaluator.is_available());
        }
    }

    #[test]
    fn test_create_ai_evaluator_ignores_enabled_flag() {
        let evaluator = create_ai_evaluator(&ai_config(false, "sk"), &CompiledPatterns::default());
        assert_eq!(evaluator.name(), "llm");
    }

    #[tokio::test]
    async fn test_unavailable_evaluator_reports_reason() {
        let evaluator = UnavailableEvaluator::new("no key");
        let result = evaluator.evaluate("任何内容都可以，这里足够长。", "srt").await;
        assert!(!result.available);
        assert_eq!(result.error.as_deref(), Some("no key"));
        assert_eq!(evaluator.reason(), "no key");
    }
}

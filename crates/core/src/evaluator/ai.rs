//! Quality evaluator backed by a remote LLM.

use async_trait::async_trait;
use regex_lite::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::CompiledPatterns;
use crate::metrics;

use super::llm::{CompletionRequest, LlmClient, LlmError};
use super::rules::MIN_TEXT_CHARS;
use super::text::extract_text;
use super::{EvaluationResult, QualityEvaluator};

/// Characters of dialogue sent to the model.
pub const PROMPT_TEXT_CHARS: usize = 1500;
/// Matches of junk patterns that mark a subtitle invalid.
const MIN_INVALID_MATCHES: usize = 2;
/// Subtitles with this many distinct lines or fewer are credit-only junk.
const MAX_JUNK_UNIQUE_LINES: usize = 5;

const SYSTEM_PROMPT: &str = "You are an expert reviewer of Chinese subtitle translations. \
Judge quality objectively and look for signs of machine translation. Reply with JSON only.";

/// Evaluator that asks an LLM to grade subtitle text.
pub struct LlmEvaluator {
    client: Arc<dyn LlmClient>,
    invalid_patterns: Vec<Regex>,
}

impl LlmEvaluator {
    pub fn new(client: Arc<dyn LlmClient>, patterns: &CompiledPatterns) -> Self {
        Self {
            client,
            invalid_patterns: patterns.invalid_content.clone(),
        }
    }

    /// Reject text that is not worth a remote call.
    pub fn precheck(&self, text: &str) -> Option<EvaluationResult> {
        if text.chars().count() < MIN_TEXT_CHARS {
            return Some(EvaluationResult::unavailable("text too short"));
        }

        let invalid_matches = self
            .invalid_patterns
            .iter()
            .filter(|re| re.is_match(text))
            .count();

        let unique_lines: HashSet<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        if invalid_matches >= MIN_INVALID_MATCHES || unique_lines.len() <= MAX_JUNK_UNIQUE_LINES {
            debug!(
                invalid_matches,
                unique_lines = unique_lines.len(),
                "Subtitle rejected before evaluation"
            );
            return Some(
                EvaluationResult::unavailable("invalid subtitle").with_issues(vec![
                    "invalid subtitle".to_string(),
                    "only advertisement or watermark content".to_string(),
                ]),
            );
        }

        None
    }

    fn build_prompt(text: &str) -> String {
        let excerpt: String = text.chars().take(PROMPT_TEXT_CHARS).collect();
        format!(
            r#"Evaluate the translation quality of the following subtitle text.

Subtitle text (first {limit} characters):
{excerpt}

Score each dimension from 0 to 10:
1. fluency: sentences read naturally in Chinese
2. accuracy: meaning is conveyed without mistranslation
3. localization: natural phrasing without machine-translation traces
4. professionalism: terminology is translated appropriately

Decide whether the subtitle is machine translated.

Return only this JSON object:
{{
    "fluency": <0-10>,
    "accuracy": <0-10>,
    "localization": <0-10>,
    "professionalism": <0-10>,
    "overall_score": <0-100>,
    "is_machine_translation": <true|false>,
    "confidence": <0-1>,
    "issues": ["issue 1", "issue 2"],
    "summary": "short verdict, under 50 characters"
}}"#,
            limit = PROMPT_TEXT_CHARS,
            excerpt = excerpt
        )
    }

    fn parse_response(text: &str) -> Result<EvaluationResult, LlmError> {
        // Extract JSON from response
        let json_str = match (text.find('{'), text.rfind('}')) {
            (Some(start), Some(end)) if start < end => &text[start..=end],
            _ => return Err(LlmError::Json(format!("no JSON object in response: {}", text))),
        };

        let value: Value = serde_json::from_str(json_str)
            .map_err(|e| LlmError::Json(format!("{}: {}", e, json_str)))?;

        let num = |key: &str| -> f64 {
            match value.get(key) {
                Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
                Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
                _ => 0.0,
            }
        };
        let sub_score = |key: &str| num(key).clamp(0.0, 10.0);

        let issues = match value.get("issues") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|i| match i {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(EvaluationResult {
            available: true,
            fluency: sub_score("fluency"),
            accuracy: sub_score("accuracy"),
            localization: sub_score("localization"),
            professionalism: sub_score("professionalism"),
            overall_score: num("overall_score").clamp(0.0, 100.0),
            is_machine_translation: value
                .get("is_machine_translation")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            confidence: num("confidence").clamp(0.0, 1.0),
            issues,
            summary: value
                .get("summary")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            error: None,
            elapsed_ms: 0,
        })
    }
}

#[async_trait]
impl QualityEvaluator for LlmEvaluator {
    fn name(&self) -> &str {
        "llm"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn evaluate(&self, content: &str, format_hint: &str) -> EvaluationResult {
        let text = extract_text(content, format_hint);

        if let Some(rejected) = self.precheck(&text) {
            metrics::EVALUATIONS.with_label_values(&["llm", "invalid"]).inc();
            return rejected;
        }

        let start = Instant::now();
        let request = CompletionRequest::new(Self::build_prompt(&text))
            .with_system(SYSTEM_PROMPT)
            .with_temperature(0.1)
            .with_max_tokens(500);

        let outcome = self
            .client
            .complete(request)
            .await
            .and_then(|response| Self::parse_response(&response));
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                debug!(
                    model = self.client.model(),
                    overall = result.overall_score,
                    elapsed_ms,
                    "LLM evaluation complete"
                );
                metrics::EVALUATIONS.with_label_values(&["llm", "ok"]).inc();
                result.with_elapsed_ms(elapsed_ms)
            }
            Err(e) => {
                warn!(model = self.client.model(), error = %e, "LLM evaluation failed");
                metrics::EVALUATIONS.with_label_values(&["llm", "unavailable"]).inc();
                EvaluationResult::unavailable(format!("evaluation failed: {}", e))
                    .with_elapsed_ms(elapsed_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Returns a fixed reply and records prompts.
    struct ScriptedLlm {
        reply: Result<String, String>,
        prompts: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(request);
            self.reply.clone().map_err(LlmError::Http)
        }
    }

    fn dialogue(lines: usize) -> String {
        (0..lines)
            .map(|i| format!("这是第{}句台词，内容各不相同。", i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    const REPLY: &str = r#"Here you go:
{"fluency": 8, "accuracy": "7.5", "localization": 9, "professionalism": 12,
 "overall_score": 82, "is_machine_translation": false, "confidence": 0.9,
 "issues": ["minor typo"], "summary": "good"}
Thanks."#;

    #[tokio::test]
    async fn test_evaluate_parses_embedded_json() {
        let llm = ScriptedLlm::replying(REPLY);
        let evaluator = LlmEvaluator::new(llm.clone(), &CompiledPatterns::default());

        let result = evaluator.evaluate(&dialogue(10), "srt").await;

        assert!(result.available);
        assert_eq!(result.fluency, 8.0);
        assert_eq!(result.accuracy, 7.5);
        assert_eq!(result.professionalism, 10.0);
        assert_eq!(result.overall_score, 82.0);
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.issues, vec!["minor typo".to_string()]);
        assert_eq!(llm.calls(), 1);

        let request = &llm.prompts.lock().unwrap()[0];
        assert_eq!(request.temperature, 0.1);
        assert_eq!(request.max_tokens, 500);
        assert!(request.system.is_some());
    }

    #[tokio::test]
    async fn test_short_text_rejected_without_call() {
        let llm = ScriptedLlm::replying(REPLY);
        let evaluator = LlmEvaluator::new(llm.clone(), &CompiledPatterns::default());

        let result = evaluator.evaluate("短", "srt").await;
        assert!(!result.available);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_few_unique_lines_rejected_without_call() {
        let llm = ScriptedLlm::replying(REPLY);
        let evaluator = LlmEvaluator::new(llm.clone(), &CompiledPatterns::default());

        let credits = "字幕制作：某某字幕组\n".repeat(40);
        let result = evaluator.evaluate(&credits, "srt").await;

        assert!(!result.available);
        assert_eq!(result.overall_score, 0.0);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_advertisement_patterns_rejected_without_call() {
        let llm = ScriptedLlm::replying(REPLY);
        let evaluator = LlmEvaluator::new(llm.clone(), &CompiledPatterns::default());

        let text = format!("{}\n第一会所 出品\n更多资源 sis001.com", dialogue(10));
        let result = evaluator.evaluate(&text, "srt").await;

        assert!(!result.available);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_single_advertisement_match_still_evaluated() {
        let llm = ScriptedLlm::replying(REPLY);
        let evaluator = LlmEvaluator::new(llm.clone(), &CompiledPatterns::default());

        let text = format!("{}\n第一会所 出品", dialogue(10));
        let result = evaluator.evaluate(&text, "srt").await;

        assert!(result.available);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_prompt_is_bounded() {
        let llm = ScriptedLlm::replying(REPLY);
        let evaluator = LlmEvaluator::new(llm.clone(), &CompiledPatterns::default());

        evaluator.evaluate(&dialogue(500), "srt").await;

        let prompt = llm.prompts.lock().unwrap()[0].prompt.clone();
        assert!(prompt.chars().count() < PROMPT_TEXT_CHARS + 1000);
        assert!(!prompt.contains("这是第499句"));
    }

    #[tokio::test]
    async fn test_client_failure_is_unavailable() {
        let llm = ScriptedLlm::failing("connection refused");
        let evaluator = LlmEvaluator::new(llm, &CompiledPatterns::default());

        let result = evaluator.evaluate(&dialogue(10), "srt").await;
        assert!(!result.available);
        assert!(result.error.unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_unavailable() {
        let llm = ScriptedLlm::replying("I cannot grade this.");
        let evaluator = LlmEvaluator::new(llm, &CompiledPatterns::default());

        let result = evaluator.evaluate(&dialogue(10), "srt").await;
        assert!(!result.available);
        assert!(result.error.is_some());
    }
}

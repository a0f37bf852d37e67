//! Heuristic quality evaluator that needs no external service.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::config::CompiledPatterns;
use crate::metrics;

use super::text::{extract_text, is_cjk};
use super::{EvaluationResult, QualityEvaluator};

/// Texts shorter than this many characters cannot be judged.
pub const MIN_TEXT_CHARS: usize = 10;

const BASE_SCORE: f64 = 7.0;
const REPEATED_CHAR_PENALTY: f64 = 1.0;
const PRONOUN_SPAM_PENALTY: f64 = 1.5;
const PUNCTUATION_RUN_PENALTY: f64 = 0.5;
const UNNATURAL_PHRASE_PENALTY: f64 = 1.0;
const LOW_CJK_PENALTY: f64 = 2.0;
const LOW_PUNCTUATION_PENALTY: f64 = 1.0;
const MIN_CJK_RATIO: f64 = 0.5;
const MIN_PUNCTUATION_RATIO: f64 = 0.01;
const CONFIDENCE: f64 = 0.6;

/// Rule-based evaluator tuned for Chinese subtitles.
#[derive(Debug, Clone)]
pub struct RuleBasedEvaluator {
    unnatural_phrases: Vec<String>,
    repeated_pronouns: Vec<String>,
}

impl Default for RuleBasedEvaluator {
    fn default() -> Self {
        Self::new(&CompiledPatterns::default())
    }
}

impl RuleBasedEvaluator {
    pub fn new(patterns: &CompiledPatterns) -> Self {
        Self {
            unnatural_phrases: patterns.unnatural_phrases.clone(),
            repeated_pronouns: patterns.repeated_pronouns.clone(),
        }
    }

    /// Score already-extracted dialogue text.
    pub fn score_text(&self, text: &str) -> EvaluationResult {
        if text.chars().count() < MIN_TEXT_CHARS {
            return EvaluationResult::unavailable("text too short")
                .with_issues(vec!["text too short".to_string()]);
        }

        let mut issues = Vec::new();
        let mut fluency = BASE_SCORE;
        let mut accuracy = BASE_SCORE;
        let mut localization = BASE_SCORE;
        let professionalism = BASE_SCORE;

        for (c, runs) in repeated_char_runs(text) {
            issues.push(format!("repeated \"{}\": {} run(s)", c, runs));
            fluency -= REPEATED_CHAR_PENALTY;
        }

        let pronoun_hits: usize = self
            .repeated_pronouns
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| text.matches(p.as_str()).count())
            .sum();
        if pronoun_hits > 0 {
            issues.push(format!("repeated pronouns: {}", pronoun_hits));
            fluency -= PRONOUN_SPAM_PENALTY;
        }

        let punctuation_runs = count_runs(text, is_run_punctuation, 2);
        if punctuation_runs > 0 {
            issues.push(format!("consecutive punctuation: {}", punctuation_runs));
            fluency -= PUNCTUATION_RUN_PENALTY;
        }

        for phrase in self.unnatural_phrases.iter().filter(|p| !p.is_empty()) {
            if text.contains(phrase.as_str()) {
                issues.push(format!("unnatural phrase: {}", phrase));
                localization -= UNNATURAL_PHRASE_PENALTY;
            }
        }

        let visible = text.chars().filter(|c| !c.is_whitespace()).count();
        let ratio = |n: usize| if visible > 0 { n as f64 / visible as f64 } else { 0.0 };

        let cjk_ratio = ratio(text.chars().filter(|c| is_cjk(*c)).count());
        if cjk_ratio < MIN_CJK_RATIO {
            accuracy -= LOW_CJK_PENALTY;
            issues.push(format!("low Chinese ratio: {:.1}%", cjk_ratio * 100.0));
        }

        let punctuation_ratio = ratio(text.chars().filter(|c| is_terminal_punctuation(*c)).count());
        if punctuation_ratio < MIN_PUNCTUATION_RATIO {
            fluency -= LOW_PUNCTUATION_PENALTY;
            issues.push("missing punctuation".to_string());
        }

        let scores = [fluency, accuracy, localization, professionalism].map(|s| s.clamp(0.0, 10.0));
        let overall_score = scores.iter().sum::<f64>() / scores.len() as f64 * 10.0;
        let is_machine_translation = overall_score < 60.0 || issues.len() > 3;

        EvaluationResult {
            available: true,
            fluency: scores[0],
            accuracy: scores[1],
            localization: scores[2],
            professionalism: scores[3],
            overall_score,
            is_machine_translation,
            confidence: CONFIDENCE,
            issues,
            summary: if is_machine_translation {
                "rule-based evaluation, likely machine translated".to_string()
            } else {
                "rule-based evaluation".to_string()
            },
            error: None,
            elapsed_ms: 0,
        }
    }
}

#[async_trait]
impl QualityEvaluator for RuleBasedEvaluator {
    fn name(&self) -> &str {
        "rules"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn evaluate(&self, content: &str, format_hint: &str) -> EvaluationResult {
        let start = Instant::now();
        let text = extract_text(content, format_hint);
        let result = self
            .score_text(&text)
            .with_elapsed_ms(start.elapsed().as_millis() as u64);

        let label = if result.available { "ok" } else { "invalid" };
        metrics::EVALUATIONS.with_label_values(&["rules", label]).inc();
        result
    }
}

/// Characters repeated at least three times in a row, with how many such
/// runs each has. Whitespace and digits are ignored.
fn repeated_char_runs(text: &str) -> BTreeMap<char, usize> {
    let mut found = BTreeMap::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        let mut len = 1;
        while chars.peek() == Some(&c) {
            chars.next();
            len += 1;
        }
        if len >= 3 && !c.is_whitespace() && !c.is_ascii_digit() {
            *found.entry(c).or_insert(0) += 1;
        }
    }
    found
}

/// Number of maximal runs of at least `min_len` characters matching `pred`.
fn count_runs(text: &str, pred: fn(char) -> bool, min_len: usize) -> usize {
    let mut runs = 0;
    let mut len = 0;
    for c in text.chars().chain(std::iter::once('\0')) {
        if pred(c) {
            len += 1;
        } else {
            if len >= min_len {
                runs += 1;
            }
            len = 0;
        }
    }
    runs
}

fn is_run_punctuation(c: char) -> bool {
    matches!(c, '，' | '。' | '、')
}

fn is_terminal_punctuation(c: char) -> bool {
    matches!(c, '，' | '。' | '！' | '？' | '、')
}

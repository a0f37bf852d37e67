//! Testing utilities and mock implementations for integration tests.
//!
//! This module provides mock implementations of the remote-facing traits,
//! allowing the download, ranking and pipeline flows to be exercised without
//! network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use subgrab_core::testing::{fixtures, MockEvaluator, MockSubtitleIndex};
//!
//! let index = MockSubtitleIndex::new();
//! let evaluator = MockEvaluator::new();
//!
//! // Configure mock responses
//! let candidate = fixtures::candidate("g1", "Movie 2020");
//! index.set_results(vec![candidate.clone()]).await;
//! index.set_content(&candidate.url, fixtures::srt(&["你好，世界。"])).await;
//! evaluator.set_default_score(85.0).await;
//! ```

mod mock_evaluator;
mod mock_index;

pub use mock_evaluator::{MockEvaluator, RecordedEvaluation};
pub use mock_index::{MockSubtitleIndex, RecordedSearch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::searcher::Candidate;

    /// Create a test candidate. `id` is used for both identifiers and the
    /// download URL.
    pub fn candidate(id: &str, name: &str) -> Candidate {
        Candidate {
            gcid: id.to_string(),
            cid: id.to_string(),
            url: format!("https://subs.example/{}", id),
            ext: "srt".to_string(),
            name: name.to_string(),
            duration: 5400,
            languages: vec!["zh-CN".to_string()],
            source: 0,
            score: 1.0,
            fingerprintf_score: 0.0,
            extra_name: String::new(),
            mt: 0,
        }
    }

    /// Create a test candidate with a server score.
    pub fn scored_candidate(id: &str, name: &str, score: f64) -> Candidate {
        Candidate {
            score,
            ..candidate(id, name)
        }
    }

    /// Build SRT bytes with one cue per line.
    pub fn srt(lines: &[&str]) -> Vec<u8> {
        let mut out = String::new();
        for (i, line) in lines.iter().enumerate() {
            out.push_str(&format!(
                "{}\n00:00:{:02},000 --> 00:00:{:02},500\n{}\n\n",
                i + 1,
                i % 60,
                i % 60,
                line
            ));
        }
        out.into_bytes()
    }

    /// Thunder search response body for `candidates`.
    pub fn search_response(candidates: &[Candidate]) -> serde_json::Value {
        serde_json::json!({
            "code": 0,
            "result": "ok",
            "data": candidates,
        })
    }
}

//! Types for the subtitle search system.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// One subtitle search result from the remote index.
///
/// Every field is defaulted permissively when the index omits it or sends
/// `null`, so minor API drift never rejects a whole response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Opaque content identifier.
    #[serde(default, deserialize_with = "lenient_string")]
    pub gcid: String,
    /// Second opaque content identifier.
    #[serde(default, deserialize_with = "lenient_string")]
    pub cid: String,
    /// Download URL.
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
    /// File extension tag without the dot (e.g., "srt").
    #[serde(default, deserialize_with = "lenient_string")]
    pub ext: String,
    /// Display name.
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    /// Duration in seconds.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub duration: i64,
    /// Language tags (e.g., "zh-CN").
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub languages: Vec<String>,
    /// Provenance code.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub source: i64,
    /// Server relevance score.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub score: f64,
    /// Fingerprint match score.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fingerprintf_score: f64,
    /// Free-text annotation.
    #[serde(default, deserialize_with = "lenient_string")]
    pub extra_name: String,
    /// Machine-translation marker.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub mt: i64,
}

impl Candidate {
    /// Stable identity used for de-duplication and selection.
    pub fn id(&self) -> String {
        compute_item_id(&self.gcid, &self.cid)
    }

    /// One-line human readable label: `[score] name (ext) extra lang=a,b`.
    pub fn label(&self) -> String {
        let mut label = format!("[{:.2}] {} ({})", self.score, self.name, self.ext);
        let extra = self.extra_name.trim_end();
        if !extra.is_empty() {
            label.push(' ');
            label.push_str(extra);
        }
        let languages: Vec<&str> = self
            .languages
            .iter()
            .map(String::as_str)
            .filter(|l| !l.is_empty())
            .collect();
        if !languages.is_empty() {
            label.push_str(" lang=");
            label.push_str(&languages.join(","));
        }
        label
    }
}

/// md5 hex digest of `gcid` followed by `cid`.
pub fn compute_item_id(gcid: &str, cid: &str) -> String {
    format!("{:x}", md5::compute(format!("{}{}", gcid, cid)))
}

/// Search response envelope.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default = "missing_code", deserialize_with = "lenient_code")]
    pub code: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub result: String,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub data: Vec<Candidate>,
}

impl SearchResponse {
    pub fn is_success(&self) -> bool {
        self.code == 0 && self.result == "ok"
    }
}

fn missing_code() -> i64 {
    -1
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(value_to_string(Value::deserialize(deserializer)?))
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(value_to_f64(&Value::deserialize(deserializer)?).unwrap_or(0.0))
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(value_to_f64(&Value::deserialize(deserializer)?)
        .map(|f| f as i64)
        .unwrap_or(0))
}

fn lenient_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(value_to_f64(&Value::deserialize(deserializer)?)
        .map(|f| f as i64)
        .unwrap_or(-1))
}

fn lenient_string_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().map(value_to_string).collect(),
        Value::String(s) if !s.is_empty() => vec![s],
        _ => Vec::new(),
    })
}

fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Errors talking to the remote index.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl RemoteError {
    /// Whether a retry might succeed (timeouts, transport and status failures).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connection(_) | Self::HttpStatus { .. } | Self::Transport(_)
        )
    }
}

/// Trait for subtitle index backends.
#[async_trait]
pub trait SubtitleIndex: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Keyword search. Non-success responses yield an empty list.
    async fn search(&self, query: &str, timeout: Duration) -> Result<Vec<Candidate>, RemoteError>;

    /// Download a whole file by URL.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(gcid: &str, cid: &str, name: &str) -> Candidate {
        serde_json::from_value(serde_json::json!({"gcid": gcid, "cid": cid, "name": name}))
            .unwrap()
    }

    #[test]
    fn test_identity_ignores_other_fields() {
        let a = candidate("g1", "c1", "A");
        let mut b = candidate("g1", "c1", "B");
        b.score = 9.0;
        assert_eq!(a.id(), b.id());
        assert_eq!(a.id(), compute_item_id("g1", "c1"));
        assert_eq!(a.id().len(), 32);
    }

    #[test]
    fn test_identity_changes_with_either_identifier() {
        let base = candidate("g1", "c1", "A");
        assert_ne!(base.id(), candidate("g2", "c1", "A").id());
        assert_ne!(base.id(), candidate("g1", "c2", "A").id());
    }

    #[test]
    fn test_identity_is_md5_of_concatenation() {
        assert_eq!(compute_item_id("", ""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_candidate_permissive_defaults() {
        let json = r#"{"gcid": null, "cid": 42, "duration": "120", "languages": null,
                       "score": "1.5", "mt": null}"#;
        let c: Candidate = serde_json::from_str(json).unwrap();
        assert_eq!(c.gcid, "");
        assert_eq!(c.cid, "42");
        assert_eq!(c.duration, 120);
        assert!(c.languages.is_empty());
        assert_eq!(c.score, 1.5);
        assert_eq!(c.mt, 0);
        assert_eq!(c.ext, "");
    }

    #[test]
    fn test_response_missing_code_is_failure() {
        let resp: SearchResponse = serde_json::from_str(r#"{"result": "ok", "data": []}"#).unwrap();
        assert_eq!(resp.code, -1);
        assert!(!resp.is_success());
    }

    #[test]
    fn test_response_null_data() {
        let resp: SearchResponse =
            serde_json::from_str(r#"{"code": 0, "result": "ok", "data": null}"#).unwrap();
        assert!(resp.is_success());
        assert!(resp.data.is_empty());
    }

    #[test]
    fn test_label_format() {
        let mut c = candidate("g", "c", "Movie.2020");
        c.ext = "srt".to_string();
        c.score = 3.14159;
        c.extra_name = "BluRay".to_string();
        c.languages = vec!["zh-CN".to_string(), "en".to_string()];
        assert_eq!(c.label(), "[3.14] Movie.2020 (srt) BluRay lang=zh-CN,en");
    }

    #[test]
    fn test_remote_error_retryable() {
        assert!(RemoteError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(RemoteError::HttpStatus {
            status: 503,
            message: String::new()
        }
        .is_retryable());
        assert!(!RemoteError::Malformed("x".into()).is_retryable());
        assert!(!RemoteError::InvalidRequest("x".into()).is_retryable());
    }
}

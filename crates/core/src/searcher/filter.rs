//! Ordering and filtering of search results.

use std::collections::HashSet;
use std::time::Duration;

use super::{Candidate, RemoteError, SubtitleIndex};

/// Upper bound accepted for `SearchOptions::limit`.
pub const MAX_SEARCH_LIMIT: usize = 200;

/// Options for [`search_items`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum results to return (1..=200).
    pub limit: usize,
    pub min_score: Option<f64>,
    /// Exact language tag to require, e.g. "zh-CN".
    pub language: Option<String>,
    pub timeout: Duration,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            min_score: None,
            language: None,
            timeout: Duration::from_secs(20),
        }
    }
}

/// Keep candidates scoring at least `min_score` and carrying `language`.
pub fn apply_filters(
    items: Vec<Candidate>,
    min_score: Option<f64>,
    language: Option<&str>,
) -> Vec<Candidate> {
    let language = language.filter(|l| !l.is_empty());
    items
        .into_iter()
        .filter(|c| min_score.map_or(true, |min| c.score >= min))
        .filter(|c| language.map_or(true, |lang| c.languages.iter().any(|l| l == lang)))
        .collect()
}

/// Stable sort, highest server score first.
pub fn sort_by_score_desc(items: &mut [Candidate]) {
    items.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Drop later candidates whose identity was already seen.
pub fn dedup_by_identity(items: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|c| seen.insert(c.id())).collect()
}

/// Search, order by score, filter, de-duplicate and truncate.
pub async fn search_items(
    index: &dyn SubtitleIndex,
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<Candidate>, RemoteError> {
    let mut items = index.search(query, options.timeout).await?;
    sort_by_score_desc(&mut items);
    let items = apply_filters(items, options.min_score, options.language.as_deref());
    let mut items = dedup_by_identity(items);
    items.truncate(options.limit.clamp(1, MAX_SEARCH_LIMIT));
    Ok(items)
}

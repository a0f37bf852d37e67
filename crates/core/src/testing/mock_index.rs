//! Mock subtitle index for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::searcher::{Candidate, RemoteError, SubtitleIndex};

/// A recorded search for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSearch {
    /// The query that was searched.
    pub query: String,
    /// Timeout passed by the caller.
    pub timeout: Duration,
    /// When the search was made.
    pub timestamp: Instant,
}

/// Mock implementation of the SubtitleIndex trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable search results, globally or per query
/// - Serve configured content per URL, with scripted fetch failures
/// - Add latency and track the peak number of concurrent fetches
///
/// Fetching a URL with no configured content fails with a 404 status.
///
/// # Example
///
/// ```rust,ignore
/// use subgrab_core::testing::{fixtures, MockSubtitleIndex};
///
/// let index = MockSubtitleIndex::new();
/// let candidate = fixtures::candidate("g1", "Movie 2020");
/// index.set_results(vec![candidate.clone()]).await;
/// index.set_content(&candidate.url, b"1\n...".to_vec()).await;
/// index.fail_fetches(&candidate.url, vec![RemoteError::Connection("reset".into())]).await;
/// ```
#[derive(Debug, Default)]
pub struct MockSubtitleIndex {
    /// Results returned for queries without a specific entry.
    results: Arc<RwLock<Vec<Candidate>>>,
    /// Results for specific queries.
    query_results: Arc<RwLock<HashMap<String, Vec<Candidate>>>>,
    /// If set, the next search fails with this error.
    next_search_error: Arc<RwLock<Option<RemoteError>>>,
    /// Recorded search queries.
    searches: Arc<RwLock<Vec<RecordedSearch>>>,
    /// Content served per URL.
    contents: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    /// Errors returned, in order, before content is served.
    scripted_failures: Arc<RwLock<HashMap<String, VecDeque<RemoteError>>>>,
    /// Fetch attempts per URL.
    fetches: Arc<RwLock<HashMap<String, usize>>>,
    /// Simulated fetch latency.
    latency: Arc<RwLock<Duration>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockSubtitleIndex {
    /// Create a new mock index with no results and no content.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock index with predefined search results.
    pub fn with_results(results: Vec<Candidate>) -> Self {
        Self {
            results: Arc::new(RwLock::new(results)),
            ..Self::default()
        }
    }

    /// Set the results returned for subsequent searches.
    pub async fn set_results(&self, results: Vec<Candidate>) {
        *self.results.write().await = results;
    }

    /// Set the results returned for one query.
    pub async fn set_query_results(&self, query: &str, results: Vec<Candidate>) {
        self.query_results
            .write()
            .await
            .insert(query.to_string(), results);
    }

    /// Configure the next search to fail with the given error.
    pub async fn fail_next_search(&self, error: RemoteError) {
        *self.next_search_error.write().await = Some(error);
    }

    /// Serve `content` for `url`.
    pub async fn set_content(&self, url: &str, content: Vec<u8>) {
        self.contents.write().await.insert(url.to_string(), content);
    }

    /// Fail the next fetches of `url` with these errors, one per attempt.
    pub async fn fail_fetches(&self, url: &str, errors: Vec<RemoteError>) {
        self.scripted_failures
            .write()
            .await
            .entry(url.to_string())
            .or_default()
            .extend(errors);
    }

    /// Delay every fetch by `latency`.
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    /// Get recorded searches.
    pub async fn recorded_searches(&self) -> Vec<RecordedSearch> {
        self.searches.read().await.clone()
    }

    /// Get the number of searches performed.
    pub async fn search_count(&self) -> usize {
        self.searches.read().await.len()
    }

    /// Number of fetch attempts for `url`.
    pub async fn fetch_count(&self, url: &str) -> usize {
        self.fetches.read().await.get(url).copied().unwrap_or(0)
    }

    /// Number of fetch attempts across all URLs.
    pub async fn total_fetches(&self) -> usize {
        self.fetches.read().await.values().sum()
    }

    /// Highest number of fetches that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter when a fetch ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SubtitleIndex for MockSubtitleIndex {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, query: &str, timeout: Duration) -> Result<Vec<Candidate>, RemoteError> {
        self.searches.write().await.push(RecordedSearch {
            query: query.to_string(),
            timeout,
            timestamp: Instant::now(),
        });

        if let Some(error) = self.next_search_error.write().await.take() {
            return Err(error);
        }

        if let Some(results) = self.query_results.read().await.get(query) {
            return Ok(results.clone());
        }

        Ok(self.results.read().await.clone())
    }

    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, RemoteError> {
        *self
            .fetches
            .write()
            .await
            .entry(url.to_string())
            .or_insert(0) += 1;

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(&self.in_flight);
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let scripted = self
            .scripted_failures
            .write()
            .await
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            return Err(error);
        }

        match self.contents.read().await.get(url) {
            Some(content) => Ok(content.clone()),
            None => Err(RemoteError::HttpStatus {
                status: 404,
                message: format!("no content for {}", url),
            }),
        }
    }
}

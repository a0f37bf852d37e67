//! Bounded retry with linear backoff for remote fetches.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::metrics;
use crate::searcher::{RemoteError, SubtitleIndex};

use super::DownloadError;

/// Default delay unit between attempts.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Retry policy: `max_retries + 1` attempts, sleeping
/// `base_delay * (attempt_index + 1)` after each retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Total attempts allowed.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Sleep before the attempt following the zero-based `attempt_index`.
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        self.base_delay.saturating_mul(attempt_index.saturating_add(1))
    }
}

/// Run `op` under `policy`.
///
/// Only retryable [`RemoteError`]s are retried; anything else is returned
/// immediately as [`DownloadError::Remote`].
pub async fn retry_remote<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, DownloadError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let mut attempt = 0u32;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(DownloadError::Remote(e)),
            Err(e) if attempt >= policy.max_retries => {
                return Err(DownloadError::RetriesExhausted {
                    attempts: attempt + 1,
                    source: e,
                });
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_attempts = policy.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Fetch failed, retrying"
                );
                metrics::DOWNLOAD_RETRIES.inc();
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Fetch `url` from `index`, retrying transport, timeout and status errors.
pub async fn fetch_with_retries(
    index: &dyn SubtitleIndex,
    url: &str,
    timeout: Duration,
    policy: &RetryPolicy,
) -> Result<Vec<u8>, DownloadError> {
    retry_remote(policy, |_| index.fetch(url, timeout)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSubtitleIndex;
    use tokio_test::{assert_err, assert_ok};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries).with_base_delay(Duration::from_millis(1))
    }

    fn unavailable() -> RemoteError {
        RemoteError::HttpStatus {
            status: 503,
            message: "busy".to_string(),
        }
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::new(3);
        assert_eq!(policy.attempts(), 4);
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_fails_twice_then_succeeds() {
        let index = MockSubtitleIndex::new();
        index.set_content("https://u/1", b"ok".to_vec()).await;
        index
            .fail_fetches("https://u/1", vec![unavailable(), unavailable()])
            .await;

        let bytes = assert_ok!(
            fetch_with_retries(&index, "https://u/1", Duration::from_secs(1), &fast(2)).await
        );

        assert_eq!(bytes, b"ok");
        assert_eq!(index.fetch_count("https://u/1").await, 3);
    }

    #[tokio::test]
    async fn test_always_failing_gives_up_after_max_retries_plus_one() {
        let index = MockSubtitleIndex::new();
        index
            .fail_fetches("https://u/1", vec![unavailable(); 10])
            .await;

        let err = fetch_with_retries(&index, "https://u/1", Duration::from_secs(1), &fast(2))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DownloadError::RetriesExhausted { attempts: 3, .. }
        ));
        assert_eq!(index.fetch_count("https://u/1").await, 3);
    }

    #[tokio::test]
    async fn test_zero_retries_is_single_attempt() {
        let index = MockSubtitleIndex::new();
        index.fail_fetches("https://u/1", vec![unavailable()]).await;

        let err = fetch_with_retries(&index, "https://u/1", Duration::from_secs(1), &fast(0))
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::RetriesExhausted { attempts: 1, .. }));
        assert_eq!(index.fetch_count("https://u/1").await, 1);
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_not_retried() {
        let index = MockSubtitleIndex::new();
        index
            .fail_fetches(
                "https://u/1",
                vec![RemoteError::Malformed("bad".to_string())],
            )
            .await;

        let err = assert_err!(
            fetch_with_retries(&index, "https://u/1", Duration::from_secs(1), &fast(5)).await
        );

        assert!(matches!(err, DownloadError::Remote(RemoteError::Malformed(_))));
        assert_eq!(index.fetch_count("https://u/1").await, 1);
    }

    #[tokio::test]
    async fn test_retry_remote_passes_attempt_index() {
        let seen = std::sync::Mutex::new(Vec::new());
        let result: Result<u32, _> = retry_remote(&fast(3), |attempt| {
            seen.lock().unwrap().push(attempt);
            async move {
                if attempt < 2 {
                    Err(RemoteError::Timeout(Duration::from_secs(1)))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }
}

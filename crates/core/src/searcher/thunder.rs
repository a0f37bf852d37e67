//! Thunder (Xunlei) subtitle index client.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::metrics;

use super::types::SearchResponse;
use super::{Candidate, RemoteError, SubtitleIndex};

/// Default API base of the public index.
pub const DEFAULT_BASE_URL: &str = "https://api-shoulei-ssl.xunlei.com";

/// HTTP client for the Thunder subtitle index.
#[derive(Debug, Clone)]
pub struct ThunderClient {
    client: Client,
    base_url: String,
}

impl Default for ThunderClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ThunderClient {
    /// Create a client for the given API base. Redirects are followed.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build the search URL for a query.
    fn build_search_url(&self, query: &str) -> String {
        format!(
            "{}/oracle/subtitle?name={}",
            self.base_url,
            urlencoding::encode(query)
        )
    }

    async fn get_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, RemoteError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::HttpStatus {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;
        Ok(bytes.to_vec())
    }
}

fn map_reqwest_error(e: reqwest::Error, timeout: Duration) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout(timeout)
    } else if e.is_connect() {
        RemoteError::Connection(e.to_string())
    } else if let Some(status) = e.status() {
        RemoteError::HttpStatus {
            status: status.as_u16(),
            message: e.to_string(),
        }
    } else if e.is_builder() {
        RemoteError::InvalidRequest(e.to_string())
    } else {
        RemoteError::Transport(e.to_string())
    }
}

#[async_trait]
impl SubtitleIndex for ThunderClient {
    fn name(&self) -> &str {
        "thunder"
    }

    async fn search(&self, query: &str, timeout: Duration) -> Result<Vec<Candidate>, RemoteError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.build_search_url(query);
        debug!(query = %query, "Searching subtitle index");

        let body = match self.get_bytes(&url, timeout).await {
            Ok(body) => body,
            Err(e) => {
                metrics::SEARCHES.with_label_values(&["error"]).inc();
                return Err(e);
            }
        };

        let response: SearchResponse = match serde_json::from_slice(&body) {
            Ok(response) => response,
            Err(e) => {
                warn!(query = %query, error = %e, "Unexpected search response shape, treating as no results");
                metrics::SEARCHES.with_label_values(&["malformed"]).inc();
                return Ok(Vec::new());
            }
        };

        if !response.is_success() {
            debug!(
                query = %query,
                code = response.code,
                result = %response.result,
                "Search returned non-success status"
            );
            metrics::SEARCHES.with_label_values(&["empty"]).inc();
            return Ok(Vec::new());
        }

        debug!(query = %query, results = response.data.len(), "Search complete");
        metrics::SEARCHES.with_label_values(&["ok"]).inc();
        Ok(response.data)
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, RemoteError> {
        if url.is_empty() {
            return Err(RemoteError::InvalidRequest("candidate has no URL".to_string()));
        }
        self.get_bytes(url, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
    use std::collections::HashMap;

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_build_search_url() {
        let client = ThunderClient::new("http://localhost:1234/");
        let url = client.build_search_url("Movie Name 2020");
        assert_eq!(
            url,
            "http://localhost:1234/oracle/subtitle?name=Movie%20Name%202020"
        );
    }

    #[tokio::test]
    async fn test_search_parses_success_response() {
        let router = Router::new().route(
            "/oracle/subtitle",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("name").map(String::as_str), Some("movie"));
                Json(serde_json::json!({
                    "code": 0,
                    "result": "ok",
                    "data": [
                        {"gcid": "g1", "cid": "c1", "url": "https://u/1", "ext": "srt", "name": "A",
                         "duration": 1, "languages": ["zh-CN"], "source": 0, "score": 1.2,
                         "fingerprintf_score": 0.0, "extra_name": "", "mt": 0},
                        {"gcid": "g2", "cid": "c2", "url": "https://u/2", "ext": "ass", "name": "B",
                         "duration": 1, "languages": ["zh-CN"], "source": 0, "score": 9.9}
                    ]
                }))
            }),
        );
        let client = ThunderClient::new(spawn_server(router).await);

        let items = client.search("movie", TIMEOUT).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "A");
        assert_eq!(items[1].score, 9.9);
        assert_eq!(items[1].mt, 0);
    }

    #[tokio::test]
    async fn test_search_non_success_is_empty() {
        let router = Router::new().route(
            "/oracle/subtitle",
            get(|| async { Json(serde_json::json!({"code": 1, "result": "fail", "data": []})) }),
        );
        let client = ThunderClient::new(spawn_server(router).await);

        let items = client.search("movie", TIMEOUT).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_search_malformed_body_is_empty() {
        let router = Router::new().route("/oracle/subtitle", get(|| async { "<html>oops</html>" }));
        let client = ThunderClient::new(spawn_server(router).await);

        let items = client.search("movie", TIMEOUT).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_search_http_error_is_retryable_error() {
        let router = Router::new().route(
            "/oracle/subtitle",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
        );
        let client = ThunderClient::new(spawn_server(router).await);

        let err = client.search("movie", TIMEOUT).await.unwrap_err();
        assert!(matches!(err, RemoteError::HttpStatus { status: 503, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_search_empty_query_skips_request() {
        let client = ThunderClient::new("http://127.0.0.1:9");
        let items = client.search("", TIMEOUT).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_returns_body_bytes() {
        let router = Router::new().route("/sub.srt", get(|| async { "1\n00:00:01,000 --> 00:00:02,000\n你好\n" }));
        let base = spawn_server(router).await;
        let client = ThunderClient::new(&base);

        let bytes = client.fetch(&format!("{}/sub.srt", base), TIMEOUT).await.unwrap();
        assert!(String::from_utf8(bytes).unwrap().contains("你好"));
    }

    #[tokio::test]
    async fn test_fetch_follows_redirects() {
        let router = Router::new()
            .route(
                "/old",
                get(|| async { axum::response::Redirect::temporary("/new") }),
            )
            .route("/new", get(|| async { "moved" }));
        let base = spawn_server(router).await;
        let client = ThunderClient::new(&base);

        let bytes = client.fetch(&format!("{}/old", base), TIMEOUT).await.unwrap();
        assert_eq!(bytes, b"moved");
    }

    #[tokio::test]
    async fn test_fetch_empty_url_is_invalid() {
        let client = ThunderClient::default();
        let err = client.fetch("", TIMEOUT).await.unwrap_err();
        assert!(matches!(err, RemoteError::InvalidRequest(_)));
        assert!(!err.is_retryable());
    }
}

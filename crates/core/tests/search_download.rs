//! Search → select → download integration tests.
//!
//! A local axum server stands in for the subtitle index, serving both the
//! search endpoint and the subtitle files.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path as UrlPath, Query},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tempfile::TempDir;

use subgrab_core::{
    download::{BatchDownloader, DownloadOptions, RetryPolicy, UniqueNameStyle},
    searcher::{search_items, SearchOptions, ThunderClient},
    selector::{DeterministicSelector, Selector},
};

async fn spawn_index() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No local addr");
    let base = format!("http://{}", addr);
    let files = base.clone();

    let router = Router::new()
        .route(
            "/oracle/subtitle",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let files = files.clone();
                async move {
                    match params.get("name").map(String::as_str) {
                        Some("movie") => Json(json!({
                            "code": 0,
                            "result": "ok",
                            "data": [
                                {"gcid": "g1", "cid": "c1", "url": format!("{}/files/a", files),
                                 "ext": "srt", "name": "A", "duration": 1,
                                 "languages": ["zh-CN"], "source": 0, "score": 1.2},
                                {"gcid": "g2", "cid": "c2", "url": format!("{}/files/b", files),
                                 "ext": "ass", "name": "B", "duration": 1,
                                 "languages": ["en"], "source": 0, "score": 9.9},
                                {"gcid": "g3", "cid": "c3", "url": format!("{}/files/missing", files),
                                 "ext": "srt", "name": "C", "duration": 1,
                                 "languages": ["zh-CN"], "source": 0, "score": 5.0}
                            ]
                        })),
                        _ => Json(json!({"code": 1, "result": "fail", "data": []})),
                    }
                }
            }),
        )
        .route(
            "/files/{name}",
            get(|UrlPath(name): UrlPath<String>| async move {
                match name.as_str() {
                    "a" => Ok(b"1\n00:00:01,000 --> 00:00:02,000\nA\n".to_vec()),
                    "b" => Ok(b"[Script Info]\nTitle: B\n".to_vec()),
                    _ => Err(StatusCode::NOT_FOUND),
                }
            }),
        );

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });
    base
}

fn fast_options() -> DownloadOptions {
    DownloadOptions {
        timeout: Duration::from_secs(5),
        retry: RetryPolicy::new(1).with_base_delay(Duration::from_millis(1)),
        overwrite: false,
        name_style: UniqueNameStyle::Parenthesized,
    }
}

#[tokio::test]
async fn test_search_sorts_by_score() {
    let base = spawn_index().await;
    let client = ThunderClient::new(base);

    let items = search_items(&client, "movie", &SearchOptions::default())
        .await
        .unwrap();

    let names: Vec<_> = items.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["B", "C", "A"]);
}

#[tokio::test]
async fn test_non_success_response_is_empty() {
    let base = spawn_index().await;
    let client = ThunderClient::new(base);

    let items = search_items(&client, "nothing", &SearchOptions::default())
        .await
        .unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_search_filters_by_language_and_limit() {
    let base = spawn_index().await;
    let client = ThunderClient::new(base);

    let options = SearchOptions {
        language: Some("zh-CN".to_string()),
        limit: 1,
        ..SearchOptions::default()
    };
    let items = search_items(&client, "movie", &options).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "C");
}

#[tokio::test]
async fn test_select_and_batch_download() {
    let base = spawn_index().await;
    let client = Arc::new(ThunderClient::new(base));
    let out = TempDir::new().unwrap();

    let items = search_items(client.as_ref(), "movie", &SearchOptions::default())
        .await
        .unwrap();
    let selection = DeterministicSelector::by_indices(vec![0, 1, 2])
        .select("movie", &items)
        .unwrap();
    assert_eq!(selection.len(), 3);

    let downloader = BatchDownloader::new(client, 2, fast_options());
    let report = downloader
        .run("movie", &selection.candidates(), out.path())
        .await;

    assert_eq!(report.total(), 3);
    assert_eq!(report.saved.len(), 2);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("movie: C: "));

    let b = report.saved.iter().find(|s| s.name == "B").unwrap();
    assert_eq!(b.path, out.path().join("B.ass"));
    assert!(std::fs::read_to_string(&b.path)
        .unwrap()
        .starts_with("[Script Info]"));
}

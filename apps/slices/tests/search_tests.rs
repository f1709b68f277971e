//! Search gateway tests against a local mock of the search service.

#![allow(clippy::unwrap_used, clippy::panic)]

use axum::{
    Json, Router,
    extract::Query,
    http::StatusCode,
    routing::get,
};
use axum_test::TestServer;
use serde_json::{Value, json};
use slices::api::{AppState, create_router};
use slices::config::{ResolverConfig, SearchConfig};
use slices::search::{MAX_SEARCH_SIZE, SearchError, SearchGateway};
use slices_core::MemoryStore;
use std::collections::HashMap;
use std::sync::Arc;

/// Echoes the received query parameters inside a `_search`-shaped payload.
async fn echo_search(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({
        "took": 1,
        "received": params,
        "hits": { "total": 0, "hits": [] }
    }))
}

async fn broken_search() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "index missing")
}

/// Serve the mock upstream on an ephemeral port and return its base URL.
async fn spawn_upstream() -> String {
    let app = Router::new()
        .route("/slices/slices/_search", get(echo_search))
        .route("/broken/_search", get(broken_search));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn gateway(base_url: &str, path: &str) -> SearchGateway {
    SearchGateway::new(&SearchConfig {
        base_url: base_url.to_string(),
        path: path.to_string(),
        timeout_ms: 5_000,
    })
    .unwrap()
}

// =============================================================================
// GATEWAY TESTS
// =============================================================================

#[tokio::test]
async fn test_query_uses_fragment_prefix() {
    let base = spawn_upstream().await;
    let gateway = gateway(&base, "/slices/slices/_search");

    let response = gateway.search("river", None).await.unwrap();

    let body: Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["received"]["q"], "fragment:river");
    assert!(body["received"].get("size").is_none());
    assert!(
        response
            .content_type
            .as_deref()
            .unwrap()
            .starts_with("application/json")
    );
}

#[tokio::test]
async fn test_size_forwarded_and_capped() {
    let base = spawn_upstream().await;
    let gateway = gateway(&base, "/slices/slices/_search");

    let small = gateway.search("river", Some(5)).await.unwrap();
    let body: Value = serde_json::from_slice(&small.body).unwrap();
    assert_eq!(body["received"]["size"], "5");

    let huge = gateway.search("river", Some(1_000_000)).await.unwrap();
    let body: Value = serde_json::from_slice(&huge.body).unwrap();
    assert_eq!(body["received"]["size"], MAX_SEARCH_SIZE.to_string());
}

#[tokio::test]
async fn test_upstream_error_surfaces_status() {
    let base = spawn_upstream().await;
    let gateway = gateway(&base, "/broken/_search");

    match gateway.search("river", None).await {
        Err(SearchError::Upstream { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "index missing");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

// =============================================================================
// ROUTE TESTS
// =============================================================================

#[tokio::test]
async fn test_search_route_passes_body_through() {
    let base = spawn_upstream().await;
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        gateway(&base, "/slices/slices/_search"),
        ResolverConfig::default(),
    );
    let server = TestServer::new(create_router(state)).unwrap();

    let response = server
        .get("/api/slices/search/lake")
        .add_query_param("size", 7)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["received"]["q"], "fragment:lake");
    assert_eq!(body["received"]["size"], "7");
    assert_eq!(body["hits"]["total"], 0);
}

#[tokio::test]
async fn test_search_route_upstream_failure_is_502() {
    let base = spawn_upstream().await;
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        gateway(&base, "/broken/_search"),
        ResolverConfig::default(),
    );
    let server = TestServer::new(create_router(state)).unwrap();

    server
        .get("/api/slices/search/lake")
        .await
        .assert_status(StatusCode::BAD_GATEWAY);
}

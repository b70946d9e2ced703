mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{numbered_profile, TableEmbedder};
use scout::config::SearchConfig;
use scout::index::EmbeddingIndex;
use scout::rerank::Reranker;
use scout::retrieval::HybridRetriever;
use scout::server::{create_router, AppState};
use scout::store::{CorpusStore, MemoryCorpusStore};

async fn state(with_retriever: bool) -> AppState {
  let store = Arc::new(MemoryCorpusStore::new());
  let mut embedder = TableEmbedder::new("table-1").with("rust", vec![1.0, 0.0]);
  for i in 0..4 {
    store.upsert(&numbered_profile(i)).await.unwrap();
    embedder = embedder.with(&format!("Name: P{i}"), vec![1.0, i as f32]);
  }

  let retriever = if with_retriever {
    let index = Arc::new(EmbeddingIndex::new(store.clone(), Arc::new(embedder), 2, Duration::from_secs(1)));
    index.backfill(10).await.unwrap();
    Some(Arc::new(HybridRetriever::new(index, Reranker::passthrough())))
  } else {
    None
  };

  AppState::new(store, retriever, SearchConfig::default(), PathBuf::from("/tmp/scout-test"))
}

async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
  let response = create_router(state).oneshot(request).await.unwrap();
  let status = response.status();
  let bytes = response.into_body().collect().await.unwrap().to_bytes();
  (status, serde_json::from_slice(&bytes).unwrap())
}

fn get(uri: &str) -> Request<Body> {
  Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_search(body: Value) -> Request<Body> {
  Request::builder()
    .method("POST")
    .uri("/search")
    .header("content-type", "application/json")
    .body(Body::from(body.to_string()))
    .unwrap()
}

#[tokio::test]
async fn test_version_is_wrapped_in_envelope() {
  let (status, body) = send(state(false).await, get("/version")).await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
  assert_eq!(body["versioning"]["resolved"], env!("CARGO_PKG_VERSION"));
  assert!(body["transaction_id"].is_string());
  assert!(body.get("errors").is_none());
}

#[tokio::test]
async fn test_status_reports_search_availability() {
  let (_, body) = send(state(false).await, get("/status")).await;
  assert_eq!(body["status"], "healthy");
  assert_eq!(body["search_available"], false);
  assert_eq!(body["data_dir"], "/tmp/scout-test");

  let (_, body) = send(state(true).await, get("/status")).await;
  assert_eq!(body["search_available"], true);
  assert_eq!(body["rerank_enabled"], false);
}

#[tokio::test]
async fn test_corpus_stats() {
  let (status, body) = send(state(true).await, get("/corpus/stats")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["corpus"]["profiles"], 4);
  assert_eq!(body["corpus"]["embedded"], 4);
  assert_eq!(body["corpus"]["models"]["table-1"], 4);
}

#[tokio::test]
async fn test_search_rejects_fanout_below_top_k() {
  let (status, body) = send(state(true).await, post_search(json!({"query": "rust", "top_k": 5, "fanout": 2}))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["errors"][0]["key"], "invalid_query");
}

#[tokio::test]
async fn test_search_without_embedding_client_is_unavailable() {
  let (status, body) = send(state(false).await, post_search(json!({"query": "rust"}))).await;
  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
  assert_eq!(body["errors"][0]["key"], "search_unavailable");
}

#[tokio::test]
async fn test_search_returns_ranked_hits() {
  let (status, body) = send(state(true).await, post_search(json!({"query": "rust", "top_k": 2}))).await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["ranking"], "embedding_order");
  assert_eq!(body["top_k"], 2);
  let results = body["results"].as_array().unwrap();
  assert_eq!(results.len(), 2);
  assert_eq!(results[0]["rank"], 1);
  assert_eq!(results[0]["canonical_id"], "https://x/in/p0");
  assert_eq!(results[0]["display_name"], "P0");
  assert_eq!(results[1]["canonical_id"], "https://x/in/p1");
}

#[tokio::test]
async fn test_malformed_search_body_is_enveloped() {
  let request = Request::builder()
    .method("POST")
    .uri("/search")
    .header("content-type", "application/json")
    .body(Body::from("{\"query\": "))
    .unwrap();
  let (status, body) = send(state(true).await, request).await;

  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["errors"][0]["key"], "invalid_request");
  assert!(body["transaction_id"].is_string());
}

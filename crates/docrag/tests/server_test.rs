//! HTTP API tests driven through the router without binding a socket.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use docrag::server;
use docrag_core::{
    DistanceMetric, EmbedError, Embedder, EmbeddingOutput, IndexSpec, StoredRecord, VectorStore,
};
use docrag_embed::{EmbedderPool, HashingEmbedder};
use docrag_query::{QueryConfig, QueryService};
use docrag_store::MemoryStore;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const DIM: usize = 64;

const TEXTS: [&str; 4] = [
    "The warranty covers manufacturing defects for two years.",
    "Refunds are issued to the original payment method.",
    "Our office is closed on public holidays.",
    "Orders over fifty euros ship for free.",
];

struct BrokenEmbedder;

#[async_trait]
impl Embedder for BrokenEmbedder {
    fn model_name(&self) -> &str {
        "broken"
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn max_tokens(&self) -> usize {
        512
    }

    async fn embed_text(&self, _texts: &[&str]) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        Err(EmbedError::Request("connection refused".to_string()))
    }
}

async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new(IndexSpec {
        name: "server-test".to_string(),
        dimension: DIM,
        metric: DistanceMetric::Cosine,
        model: format!("docrag/hashing-{DIM}"),
    }));
    store.init().await.unwrap();

    let hashing = HashingEmbedder::new(DIM);
    let records: Vec<StoredRecord> = TEXTS
        .iter()
        .enumerate()
        .map(|(i, text)| {
            StoredRecord::new(
                "policies.txt",
                i as u32,
                (*text).to_string(),
                hashing.embed_one(text).embedding,
            )
        })
        .collect();
    store.upsert(&records).await.unwrap();
    store
}

async fn app_with(embedder: Arc<dyn Embedder>) -> Router {
    let service = QueryService::new(
        Arc::new(EmbedderPool::new(embedder, 2)),
        seeded_store().await,
        QueryConfig {
            default_top_k: 2,
            max_top_k: 3,
            timeout: Duration::from_secs(5),
        },
    );
    server::router(Arc::new(service))
}

async fn app() -> Router {
    app_with(Arc::new(HashingEmbedder::new(DIM))).await
}

fn search_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/search")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_search_returns_aligned_chunks_and_scores() {
    let body = json!({ "query": "how are refunds issued", "top_k": 3 }).to_string();
    let (status, value) = send(app().await, search_request(body)).await;

    assert_eq!(status, StatusCode::OK);
    let chunks = value["chunks"].as_array().unwrap();
    let scores = value["scores"].as_array().unwrap();
    assert_eq!(chunks.len(), 3);
    assert_eq!(scores.len(), 3);

    assert_eq!(chunks[0]["source"], "policies.txt");
    assert_eq!(chunks[0]["chunk"], 1);
    assert_eq!(chunks[0]["text"], TEXTS[1]);

    let scores: Vec<f64> = scores.iter().map(|s| s.as_f64().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_search_uses_default_top_k() {
    let body = json!({ "query": "warranty" }).to_string();
    let (status, value) = send(app().await, search_request(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["chunks"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_search_clamps_top_k() {
    let body = json!({ "query": "warranty", "top_k": 100 }).to_string();
    let (status, value) = send(app().await, search_request(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["chunks"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (status, value) = send(app().await, search_request("{\"query\": ")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(value["error"].is_string());
}

#[tokio::test]
async fn test_missing_query_field_is_bad_request() {
    let body = json!({ "top_k": 2 }).to_string();
    let (status, _) = send(app().await, search_request(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_content_type_is_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri("/search")
        .body(Body::from(json!({ "query": "warranty" }).to_string()))
        .unwrap();
    let (status, _) = send(app().await, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_query_is_bad_request() {
    let body = json!({ "query": "   " }).to_string();
    let (status, value) = send(app().await, search_request(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(value["error"].as_str().unwrap().contains("query"));
}

#[tokio::test]
async fn test_zero_top_k_is_bad_request() {
    let body = json!({ "query": "warranty", "top_k": 0 }).to_string();
    let (status, _) = send(app().await, search_request(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_embedder_failure_is_server_error() {
    let body = json!({ "query": "warranty" }).to_string();
    let (status, value) = send(app_with(Arc::new(BrokenEmbedder)).await, search_request(body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(value["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_healthz_reports_records() {
    let request = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let (status, value) = send(app().await, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["status"], "ok");
    assert_eq!(value["records"], 4);
}

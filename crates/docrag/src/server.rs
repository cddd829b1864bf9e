//! HTTP API: `POST /search` and `GET /healthz`.

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use docrag_query::{QueryError, QueryService, SearchRequest, SearchResponse};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info};

type ApiError = (StatusCode, Json<ErrorBody>);

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Health response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthBody {
    pub status: String,
    pub records: u64,
}

/// Build the API router.
pub fn router(service: Arc<QueryService>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/search", post(search))
        .with_state(service)
}

/// Serve the API on `addr` until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, service: Arc<QueryService>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Resolve once `signal` fires.
///
/// If the signal handler cannot be installed the error is logged and the
/// returned future never resolves, so the server keeps running.
pub async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!("Failed to install shutdown signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn healthz(
    State(service): State<Arc<QueryService>>,
) -> Result<Json<HealthBody>, ApiError> {
    let records = service.store().count().await.map_err(|e| {
        error!("Health check failed: {}", e);
        internal_error(e.to_string())
    })?;
    Ok(Json(HealthBody {
        status: "ok".to_string(),
        records,
    }))
}

async fn search(
    State(service): State<Arc<QueryService>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;

    match service.handle(&request).await {
        Ok(response) => {
            debug!("Returning {} chunks", response.chunks.len());
            Ok(Json(response))
        }
        Err(QueryError::InvalidRequest(message)) => Err(bad_request(message)),
        Err(e) => {
            error!("Search failed: {}", e);
            Err(internal_error(e.to_string()))
        }
    }
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

fn internal_error(message: impl Into<String>) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

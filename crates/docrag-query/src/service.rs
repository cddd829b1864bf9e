//! Query execution.

use docrag_core::{Error, RecordMetadata, SearchHit, VectorStore};
use docrag_embed::EmbedderPool;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Query service configuration.
#[derive(Debug, Clone, Copy)]
pub struct QueryConfig {
    /// Results returned when the caller does not ask for a count
    pub default_top_k: usize,
    /// Upper bound on results per query
    pub max_top_k: usize,
    /// Deadline for embedding plus search
    pub timeout: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            max_top_k: 50,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Query errors.
#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    /// The request itself is unusable
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Embedding, store or timeout failure
    #[error(transparent)]
    Backend(#[from] Error),
}

impl QueryError {
    /// Whether the caller is at fault.
    #[must_use]
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }
}

/// Search request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Search response body: metadata and distances aligned by position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub chunks: Vec<RecordMetadata>,
    pub scores: Vec<f32>,
}

impl From<Vec<SearchHit>> for SearchResponse {
    fn from(hits: Vec<SearchHit>) -> Self {
        let (chunks, scores) = hits.into_iter().map(|h| (h.metadata, h.distance)).unzip();
        Self { chunks, scores }
    }
}

/// Embeds queries and searches the vector store.
pub struct QueryService {
    embedder: Arc<EmbedderPool>,
    store: Arc<dyn VectorStore>,
    config: QueryConfig,
}

impl QueryService {
    /// Create a new query service.
    pub fn new(
        embedder: Arc<EmbedderPool>,
        store: Arc<dyn VectorStore>,
        config: QueryConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    /// Vector store being searched.
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Service configuration.
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Resolve the number of results for a request.
    ///
    /// `None` means the default; zero is rejected; anything above the
    /// maximum is clamped.
    pub fn resolve_top_k(&self, top_k: Option<usize>) -> Result<usize, QueryError> {
        match top_k {
            Some(0) => Err(QueryError::InvalidRequest(
                "top_k must be at least 1".to_string(),
            )),
            Some(k) => Ok(k.min(self.config.max_top_k)),
            None => Ok(self.config.default_top_k.min(self.config.max_top_k)),
        }
    }

    /// Embed `query` and return the nearest stored chunks, ascending by distance.
    pub async fn search(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchHit>, QueryError> {
        if query.trim().is_empty() {
            return Err(QueryError::InvalidRequest("query is empty".to_string()));
        }
        let k = self.resolve_top_k(top_k)?;
        debug!("Executing query with top_k {}: {}", k, query);

        let run = async {
            let vector = self.embedder.embed_query(query).await?;
            let hits = self.store.query(&vector, k).await?;
            Ok::<_, Error>(hits)
        };

        let hits = tokio::time::timeout(self.config.timeout, run)
            .await
            .map_err(|_| {
                Error::Timeout(format!("query took longer than {:?}", self.config.timeout))
            })??;

        debug!("Found {} results", hits.len());
        Ok(hits)
    }

    /// Run a [`SearchRequest`] and build its response.
    pub async fn handle(&self, request: &SearchRequest) -> Result<SearchResponse, QueryError> {
        self.search(&request.query, request.top_k)
            .await
            .map(SearchResponse::from)
    }
}

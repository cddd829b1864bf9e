//! Embedder pool: concurrency limit, batching and output validation.

use docrag_core::{EmbedError, Embedder};
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Result of embedding one batch of a larger input.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Positions of this batch within the input slice
    pub range: Range<usize>,
    /// One vector per input in `range`, or the batch's error
    pub result: Result<Vec<Vec<f32>>, EmbedError>,
}

impl BatchOutcome {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Shared embedder with concurrency control.
pub struct EmbedderPool {
    embedder: Arc<dyn Embedder>,
    /// Limits concurrent inference
    semaphore: Semaphore,
    max_concurrent: usize,
}

impl EmbedderPool {
    /// Create a new embedder pool.
    pub fn new(embedder: Arc<dyn Embedder>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            embedder,
            semaphore: Semaphore::new(max_concurrent),
            max_concurrent,
        }
    }

    /// Get the embedding dimension.
    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    /// Get the model name.
    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Get the underlying embedder.
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        Arc::clone(&self.embedder)
    }

    /// Embed one batch of texts.
    ///
    /// Fails if the backend returns the wrong number of vectors or a vector
    /// of the wrong dimension.
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| EmbedError::Inference(format!("semaphore error: {e}")))?;

        let outputs = self.embedder.embed_text(texts).await?;
        self.validate(texts.len(), outputs.into_iter().map(|o| o.embedding).collect())
    }

    /// Embed a single query.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>, EmbedError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| EmbedError::Inference(format!("semaphore error: {e}")))?;

        let output = self.embedder.embed_query(query).await?;
        let mut vectors = self.validate(1, vec![output.embedding])?;
        vectors
            .pop()
            .ok_or_else(|| EmbedError::Inference("empty embedding result".to_string()))
    }

    /// Embed `texts` in consecutive batches of at most `batch_size`.
    ///
    /// Batches run one after another. A failed batch is reported in its
    /// outcome and does not affect the others.
    pub async fn embed_batches(&self, texts: &[&str], batch_size: usize) -> Vec<BatchOutcome> {
        let batch_size = batch_size.max(1);
        let mut outcomes = Vec::with_capacity(texts.len().div_ceil(batch_size));

        for (n, batch) in texts.chunks(batch_size).enumerate() {
            let start = n * batch_size;
            let range = start..start + batch.len();
            debug!("Embedding batch {:?} ({} texts)", range, batch.len());

            let result = self.embed_batch(batch).await;
            if let Err(e) = &result {
                warn!("Embedding batch {:?} failed: {}", range, e);
            }
            outcomes.push(BatchOutcome { range, result });
        }

        outcomes
    }

    /// Available inference permits.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Get max concurrent operations.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    fn validate(
        &self,
        expected: usize,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        if vectors.len() != expected {
            return Err(EmbedError::InvalidResponse(format!(
                "{} returned {} embeddings for {} inputs",
                self.model_name(),
                vectors.len(),
                expected
            )));
        }
        let dimension = self.dimension();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(EmbedError::InvalidResponse(format!(
                "{} returned a {}-dimensional embedding, expected {}",
                self.model_name(),
                bad.len(),
                dimension
            )));
        }
        Ok(vectors)
    }
}

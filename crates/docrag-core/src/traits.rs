//! Core traits for docrag components.
//!
//! - [`ContentExtractor`]: Extract plain text from a document
//! - [`Chunker`]: Split text into chunks
//! - [`Embedder`]: Generate vector embeddings
//! - [`VectorStore`]: Store records and answer nearest-neighbor queries
//!
//! Components are constructed explicitly and passed around as trait objects,
//! so any stage can be swapped for a fake in tests.

use async_trait::async_trait;
use std::path::Path;

use crate::error::{ChunkError, EmbedError, ExtractError, StoreError};
use crate::types::{
    ChunkConfig, ChunkOutput, DocumentType, EmbeddingOutput, IndexSpec, SearchHit, StoreStats,
    StoredRecord,
};

// ============================================================================
// Content Extraction
// ============================================================================

/// Trait for extracting plain text from a file.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// The document type this extractor handles.
    fn document_type(&self) -> DocumentType;

    /// Check if this extractor can handle the given file, by extension.
    fn can_extract(&self, path: &Path) -> bool {
        DocumentType::from_path(path) == Some(self.document_type())
    }

    /// Extract the text of a file.
    async fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

// ============================================================================
// Chunking
// ============================================================================

/// Trait for splitting text into chunks.
#[async_trait]
pub trait Chunker: Send + Sync {
    /// Name of this chunking strategy.
    fn name(&self) -> &str;

    /// Chunk a document's text. Chunks are returned in document order.
    async fn chunk(&self, text: &str, config: &ChunkConfig)
        -> Result<Vec<ChunkOutput>, ChunkError>;
}

// ============================================================================
// Embedding
// ============================================================================

/// Trait for generating embeddings.
///
/// Implementations must return exactly one embedding per input, in input
/// order, and the embedding of a text must not depend on which other texts
/// share its call.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model name, recorded in the index manifest.
    fn model_name(&self) -> &str;

    /// Embedding dimension.
    fn dimension(&self) -> usize;

    /// Maximum input length in tokens.
    fn max_tokens(&self) -> usize;

    /// Embed a batch of texts.
    async fn embed_text(&self, texts: &[&str]) -> Result<Vec<EmbeddingOutput>, EmbedError>;

    /// Embed a search query.
    async fn embed_query(&self, query: &str) -> Result<EmbeddingOutput, EmbedError> {
        let results = self.embed_text(&[query]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Inference("empty embedding result".to_string()))
    }
}

// ============================================================================
// Vector Storage
// ============================================================================

/// Trait for vector storage backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Parameters of this index.
    fn spec(&self) -> &IndexSpec;

    /// Create the index if absent, or verify an existing one against [`spec`](Self::spec).
    ///
    /// Idempotent. A mismatching existing index is a [`StoreError::Config`] error.
    async fn init(&self) -> Result<(), StoreError>;

    /// Insert or overwrite records by id.
    async fn upsert(&self, records: &[StoredRecord]) -> Result<(), StoreError>;

    /// Return at most `k` records nearest to `vector`, ascending by distance.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError>;

    /// Delete records of `source` whose chunk index is `>= first_index`.
    ///
    /// Returns the number of records removed.
    async fn delete_source_from(&self, source: &str, first_index: u32)
        -> Result<u64, StoreError>;

    /// Delete records by id. Unknown ids are ignored.
    ///
    /// Returns the number of records removed.
    async fn delete_ids(&self, ids: &[String]) -> Result<u64, StoreError>;

    /// Number of stored records.
    async fn count(&self) -> Result<u64, StoreError>;

    /// Store statistics.
    async fn stats(&self) -> Result<StoreStats, StoreError>;
}

/// Check a vector's length against an index dimension.
pub fn check_dimension(spec: &IndexSpec, vector: &[f32]) -> Result<(), StoreError> {
    if vector.len() == spec.dimension {
        Ok(())
    } else {
        Err(crate::error::StoreConfigError::DimensionMismatch {
            expected: spec.dimension,
            actual: vector.len(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DistanceMetric;

    struct UppercaseChunker;

    #[async_trait]
    impl Chunker for UppercaseChunker {
        fn name(&self) -> &str {
            "upper"
        }

        async fn chunk(
            &self,
            text: &str,
            _config: &ChunkConfig,
        ) -> Result<Vec<ChunkOutput>, ChunkError> {
            Ok(vec![ChunkOutput {
                index: 0,
                content: text.to_uppercase(),
                char_range: 0..text.chars().count(),
            }])
        }
    }

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn model_name(&self) -> &str {
            "fixed"
        }

        fn dimension(&self) -> usize {
            2
        }

        fn max_tokens(&self) -> usize {
            16
        }

        async fn embed_text(&self, texts: &[&str]) -> Result<Vec<EmbeddingOutput>, EmbedError> {
            Ok(texts
                .iter()
                .map(|t| EmbeddingOutput {
                    embedding: vec![t.len() as f32, 1.0],
                    token_count: 1,
                })
                .collect())
        }
    }

    struct PdfOnly;

    #[async_trait]
    impl ContentExtractor for PdfOnly {
        fn document_type(&self) -> DocumentType {
            DocumentType::Pdf
        }

        async fn extract(&self, _path: &Path) -> Result<String, ExtractError> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_chunker_trait_object() {
        let chunker: Box<dyn Chunker> = Box::new(UppercaseChunker);
        let chunks = chunker.chunk("abc", &ChunkConfig::default()).await.unwrap();
        assert_eq!(chunker.name(), "upper");
        assert_eq!(chunks[0].content, "ABC");
    }

    #[tokio::test]
    async fn test_default_embed_query_uses_embed_text() {
        let embedder = FixedEmbedder;
        let output = embedder.embed_query("four").await.unwrap();
        assert_eq!(output.embedding, vec![4.0, 1.0]);
    }

    #[test]
    fn test_can_extract_by_extension() {
        let extractor = PdfOnly;
        assert!(extractor.can_extract(Path::new("paper.PDF")));
        assert!(!extractor.can_extract(Path::new("paper.md")));
    }

    #[test]
    fn test_check_dimension() {
        let spec = IndexSpec {
            name: "idx".to_string(),
            dimension: 3,
            metric: DistanceMetric::Cosine,
            model: "m".to_string(),
        };
        assert!(check_dimension(&spec, &[0.0, 0.0, 0.0]).is_ok());
        let err = check_dimension(&spec, &[0.0, 0.0]).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }
}

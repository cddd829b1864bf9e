//! Deterministic feature-hashing embedder.
//!
//! Needs no model download or network. Each lowercase word and each
//! character trigram of a text is hashed with blake3 into one of
//! `dimension` signed buckets, and the bucket vector is L2-normalized.
//! Texts sharing vocabulary land close together under cosine distance,
//! which is enough for tests and air-gapped setups.

use async_trait::async_trait;
use docrag_core::{EmbedError, Embedder, EmbeddingOutput};

/// Feature-hashing embedder.
pub struct HashingEmbedder {
    dimension: usize,
    model_name: String,
}

impl HashingEmbedder {
    /// Create a hashing embedder with the given dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model_name: format!("docrag/hashing-{dimension}"),
        }
    }

    /// Embed a single text synchronously.
    #[must_use]
    pub fn embed_one(&self, text: &str) -> EmbeddingOutput {
        let mut vector = vec![0.0f32; self.dimension];
        let mut token_count = 0;

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            token_count += 1;
            let word = word.to_lowercase();
            self.add_feature(&mut vector, b"w:", word.as_bytes(), 1.0);

            let chars: Vec<char> = word.chars().collect();
            for gram in chars.windows(3) {
                let gram: String = gram.iter().collect();
                self.add_feature(&mut vector, b"g:", gram.as_bytes(), 0.5);
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }

        EmbeddingOutput {
            embedding: vector,
            token_count,
        }
    }

    fn add_feature(&self, vector: &mut [f32], prefix: &[u8], feature: &[u8], weight: f32) {
        let mut hasher = blake3::Hasher::new();
        hasher.update(prefix);
        hasher.update(feature);
        let hash = hasher.finalize();
        let bytes = hash.as_bytes();

        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&bytes[..8]);
        let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign * weight;
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_tokens(&self) -> usize {
        usize::MAX
    }

    async fn embed_text(&self, texts: &[&str]) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

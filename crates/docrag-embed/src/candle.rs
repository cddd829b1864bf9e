//! Local sentence embeddings with Candle.
//!
//! Uses `sentence-transformers/all-MiniLM-L6-v2`:
//! - 384 dimensions
//! - 256 max tokens (longer inputs are truncated)
//! - BERT architecture, mean pooling, L2-normalized output

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use docrag_core::{EmbedError, Embedder, EmbeddingOutput};
use hf_hub::api::tokio::ApiBuilder;
use hf_hub::{Repo, RepoType};
use std::path::PathBuf;
use std::sync::Arc;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Model identifier on HuggingFace Hub.
pub const MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Embedding dimension for all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Maximum sequence length.
const MAX_TOKENS: usize = 256;

/// Tokenizer and weights, loaded once.
struct LoadedModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

/// all-MiniLM-L6-v2 embedder using Candle.
pub struct CandleEmbedder {
    device: Device,
    /// Hub cache directory for downloaded weights
    cache_dir: PathBuf,
    loaded: OnceCell<Arc<LoadedModel>>,
}

impl CandleEmbedder {
    /// Create a new embedder. The model is downloaded and loaded on first use.
    pub fn new(cache_dir: PathBuf) -> Self {
        // Try to use CUDA if available, fallback to CPU
        let device = Device::cuda_if_available(0).unwrap_or(Device::Cpu);
        info!("CandleEmbedder using device: {:?}", device);
        Self::with_device(cache_dir, device)
    }

    /// Create with specific device.
    pub fn with_device(cache_dir: PathBuf, device: Device) -> Self {
        Self {
            device,
            cache_dir,
            loaded: OnceCell::new(),
        }
    }

    /// Download (if needed) and load the model. Idempotent.
    pub async fn init(&self) -> Result<(), EmbedError> {
        self.model().await.map(|_| ())
    }

    async fn model(&self) -> Result<Arc<LoadedModel>, EmbedError> {
        self.loaded
            .get_or_try_init(|| self.load())
            .await
            .map(Arc::clone)
    }

    async fn load(&self) -> Result<Arc<LoadedModel>, EmbedError> {
        info!("Loading embedding model {} (cache: {:?})", MODEL_ID, self.cache_dir);

        let api = ApiBuilder::new()
            .with_cache_dir(self.cache_dir.clone())
            .build()
            .map_err(|e| EmbedError::ModelLoad(format!("Failed to create HF API: {e}")))?;
        let repo = api.repo(Repo::new(MODEL_ID.to_string(), RepoType::Model));

        debug!("Fetching tokenizer, config and weights...");
        let tokenizer_path = repo
            .get("tokenizer.json")
            .await
            .map_err(|e| EmbedError::ModelLoad(format!("Failed to download tokenizer: {e}")))?;
        let config_path = repo
            .get("config.json")
            .await
            .map_err(|e| EmbedError::ModelLoad(format!("Failed to download config: {e}")))?;
        let weights_path = repo
            .get("model.safetensors")
            .await
            .map_err(|e| EmbedError::ModelLoad(format!("Failed to download weights: {e}")))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbedError::ModelLoad(format!("Failed to load tokenizer: {e}")))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| EmbedError::ModelLoad(format!("Failed to set truncation: {e}")))?;
        tokenizer.with_padding(Some(PaddingParams::default()));

        let config_str = tokio::fs::read_to_string(&config_path)
            .await
            .map_err(|e| EmbedError::ModelLoad(format!("Failed to read config: {e}")))?;
        let config: Config = serde_json::from_str(&config_str)
            .map_err(|e| EmbedError::ModelLoad(format!("Failed to parse config: {e}")))?;

        // SAFETY: the safetensors file comes from the Hub cache and is only read.
        #[allow(unsafe_code)]
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &self.device)
                .map_err(|e| EmbedError::ModelLoad(format!("Failed to load weights: {e}")))?
        };
        let model = BertModel::load(vb, &config)
            .map_err(|e| EmbedError::ModelLoad(format!("Failed to create BERT model: {e}")))?;

        info!("Embedding model loaded");
        Ok(Arc::new(LoadedModel {
            model,
            tokenizer,
            device: self.device.clone(),
        }))
    }
}

impl LoadedModel {
    /// Tokenize, run the model, mean-pool and normalize one batch.
    fn encode(&self, texts: &[String]) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbedError::Inference(format!("Tokenization failed: {e}")))?;

        let batch_size = encodings.len();
        let seq_len = encodings.first().map_or(0, tokenizers::Encoding::len);

        let mut input_ids = Vec::with_capacity(batch_size * seq_len);
        let mut attention = Vec::with_capacity(batch_size * seq_len);
        let mut token_counts = Vec::with_capacity(batch_size);
        for encoding in &encodings {
            input_ids.extend_from_slice(encoding.get_ids());
            attention.extend_from_slice(encoding.get_attention_mask());
            token_counts.push(encoding.get_attention_mask().iter().filter(|&&m| m == 1).count());
        }

        let input_ids = Tensor::from_vec(input_ids, (batch_size, seq_len), &self.device)
            .map_err(|e| EmbedError::Inference(format!("input_ids tensor: {e}")))?;
        let attention_mask = Tensor::from_vec(attention, (batch_size, seq_len), &self.device)
            .map_err(|e| EmbedError::Inference(format!("attention_mask tensor: {e}")))?;
        let token_type_ids = input_ids
            .zeros_like()
            .map_err(|e| EmbedError::Inference(format!("token_type_ids tensor: {e}")))?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(|e| EmbedError::Inference(format!("Model forward failed: {e}")))?;

        let pooled = mean_pooling(&output, &attention_mask)?;
        let normalized = l2_normalize(&pooled)?;

        let vectors = normalized
            .to_vec2::<f32>()
            .map_err(|e| EmbedError::Inference(format!("Failed to read embeddings: {e}")))?;

        Ok(vectors
            .into_iter()
            .zip(token_counts)
            .map(|(embedding, token_count)| EmbeddingOutput {
                embedding,
                token_count,
            })
            .collect())
    }
}

/// Average token embeddings, ignoring padding.
fn mean_pooling(token_embeddings: &Tensor, attention_mask: &Tensor) -> Result<Tensor, EmbedError> {
    let inference = |stage: &str, e: candle_core::Error| {
        EmbedError::Inference(format!("mean pooling ({stage}): {e}"))
    };

    let mask = attention_mask
        .to_dtype(DType::F32)
        .map_err(|e| inference("dtype", e))?
        .unsqueeze(2)
        .map_err(|e| inference("unsqueeze", e))?
        .broadcast_as(token_embeddings.shape())
        .map_err(|e| inference("broadcast", e))?;

    let summed = token_embeddings
        .mul(&mask)
        .map_err(|e| inference("mul", e))?
        .sum(1)
        .map_err(|e| inference("sum", e))?;
    let counts = mask
        .sum(1)
        .map_err(|e| inference("mask sum", e))?
        .clamp(1e-9, f64::MAX)
        .map_err(|e| inference("clamp", e))?;

    summed.div(&counts).map_err(|e| inference("div", e))
}

/// Scale each row to unit length.
fn l2_normalize(embeddings: &Tensor) -> Result<Tensor, EmbedError> {
    let norm = embeddings
        .sqr()
        .and_then(|t| t.sum_keepdim(1))
        .and_then(|t| t.sqrt())
        .and_then(|t| t.clamp(1e-12, f64::MAX))
        .map_err(|e| EmbedError::Inference(format!("norm failed: {e}")))?;

    embeddings
        .broadcast_div(&norm)
        .map_err(|e| EmbedError::Inference(format!("normalize failed: {e}")))
}

#[async_trait]
impl Embedder for CandleEmbedder {
    fn model_name(&self) -> &str {
        MODEL_ID
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    fn max_tokens(&self) -> usize {
        MAX_TOKENS
    }

    async fn embed_text(&self, texts: &[&str]) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model().await?;
        let owned: Vec<String> = texts.iter().map(|t| (*t).to_string()).collect();
        debug!("Embedding {} texts", owned.len());

        tokio::task::spawn_blocking(move || model.encode(&owned))
            .await
            .map_err(|e| EmbedError::Inference(format!("Embedding task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    #[ignore] // Requires model download
    async fn test_candle_embedder() {
        let cache_dir = tempdir().unwrap();
        let embedder = CandleEmbedder::new(cache_dir.path().to_path_buf());
        embedder.init().await.unwrap();

        assert_eq!(embedder.dimension(), 384);
        assert_eq!(embedder.model_name(), "sentence-transformers/all-MiniLM-L6-v2");

        let results = embedder
            .embed_text(&["Hello world", "This is a test"])
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].embedding.len(), 384);

        let norm: f32 = results[0].embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01);
    }

    #[tokio::test]
    #[ignore] // Requires model download
    async fn test_padding_does_not_change_embeddings() {
        let cache_dir = tempdir().unwrap();
        let embedder = CandleEmbedder::new(cache_dir.path().to_path_buf());

        let alone = embedder.embed_text(&["short"]).await.unwrap();
        let padded = embedder
            .embed_text(&["short", "a much longer sentence that forces padding of the first"])
            .await
            .unwrap();

        for (a, b) in alone[0].embedding.iter().zip(&padded[0].embedding) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_mean_pooling_ignores_padding() {
        let device = Device::Cpu;
        // batch 1, seq 3, hidden 2; last token is padding
        let tokens = Tensor::new(&[[[1.0f32, 2.0], [3.0, 4.0], [100.0, 100.0]]], &device).unwrap();
        let mask = Tensor::new(&[[1u32, 1, 0]], &device).unwrap();

        let pooled = mean_pooling(&tokens, &mask).unwrap();
        assert_eq!(pooled.to_vec2::<f32>().unwrap(), vec![vec![2.0, 3.0]]);
    }

    #[test]
    fn test_l2_normalize_rows() {
        let device = Device::Cpu;
        let t = Tensor::new(&[[3.0f32, 4.0], [0.0, 2.0]], &device).unwrap();
        let n = l2_normalize(&t).unwrap().to_vec2::<f32>().unwrap();
        assert!((n[0][0] - 0.6).abs() < 1e-6);
        assert!((n[0][1] - 0.8).abs() < 1e-6);
        assert!((n[1][1] - 1.0).abs() < 1e-6);
    }
}

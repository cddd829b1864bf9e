//! Component wiring: builds the embedder, store, ingestion driver and query
//! service from a [`Config`].

use anyhow::{Context, Result};
use docrag_chunker::FixedOffsetChunker;
use docrag_core::{Embedder, IndexSpec, VectorStore};
#[cfg(feature = "candle")]
use docrag_embed::CandleEmbedder;
use docrag_embed::{EmbedderPool, HashingEmbedder, OpenAiConfig, OpenAiEmbedder};
use docrag_extract::ExtractorRegistry;
use docrag_ingest::{IngestConfig, IngestDriver};
use docrag_query::{QueryConfig, QueryService};
#[cfg(feature = "lancedb")]
use docrag_store::LanceStore;
use docrag_store::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{Config, EmbedderBackend, StoreBackend};

/// Dimension of the hashing embedder when none is configured.
const DEFAULT_HASHING_DIM: usize = 384;

/// Embedder and opened index, shared by ingestion and serving.
#[derive(Clone)]
pub struct Components {
    pub embedder: Arc<EmbedderPool>,
    pub store: Arc<dyn VectorStore>,
}

impl Components {
    /// Build the embedder and open the index (create-if-absent).
    ///
    /// Fails when the index was created with a different dimension, metric
    /// or model than the configured embedder produces.
    pub async fn open(config: &Config) -> Result<Self> {
        let embedder = build_embedder(config).await?;
        let spec = index_spec(config, embedder.as_ref());
        let store = build_store(config, spec)?;
        store.init().await.context("Failed to open index")?;

        Ok(Self::new(embedder, store, config.embedding.max_concurrent))
    }

    /// Assemble from already-built parts. The store must be initialized.
    #[must_use]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            embedder: Arc::new(EmbedderPool::new(embedder, max_concurrent)),
            store,
        }
    }

    /// Ingestion driver over these components.
    #[must_use]
    pub fn ingest_driver(&self, config: &Config) -> IngestDriver {
        IngestDriver::new(
            Arc::new(ExtractorRegistry::with_defaults()),
            Arc::new(FixedOffsetChunker::new()),
            Arc::clone(&self.embedder),
            Arc::clone(&self.store),
            IngestConfig {
                chunk_config: config.chunking.chunk_config(),
                batch_size: config.embedding.batch_size,
            },
        )
    }

    /// Query service over these components.
    #[must_use]
    pub fn query_service(&self, config: &Config) -> QueryService {
        QueryService::new(
            Arc::clone(&self.embedder),
            Arc::clone(&self.store),
            QueryConfig {
                default_top_k: config.server.default_top_k,
                max_top_k: config.server.max_top_k,
                timeout: config.server.request_timeout(),
            },
        )
    }
}

/// Build the configured embedder. Local models are loaded before returning.
pub async fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let settings = &config.embedding;
    match settings.backend {
        EmbedderBackend::Hashing => {
            let dim = settings.dimension.unwrap_or(DEFAULT_HASHING_DIM);
            Ok(Arc::new(HashingEmbedder::new(dim)))
        }
        EmbedderBackend::OpenAi => {
            let api_key = settings
                .api_key
                .clone()
                .context("OPENAI_API_KEY must be set when the embedder is 'openai'")?;
            let mut openai = OpenAiConfig::new(api_key);
            if let Some(base) = &settings.api_base {
                openai.base_url.clone_from(base);
            }
            if let Some(model) = &settings.model {
                openai.model.clone_from(model);
            }
            if let Some(dim) = settings.dimension {
                openai.dimension = dim;
                openai.request_dimensions = openai.model.starts_with("text-embedding-3");
            }
            openai.timeout = Duration::from_secs(settings.timeout_secs);
            openai.max_retries = settings.max_retries;

            info!("Using remote embedder {} at {}", openai.model, openai.base_url);
            let embedder =
                OpenAiEmbedder::new(openai).context("Failed to create OpenAI embedder")?;
            Ok(Arc::new(embedder))
        }
        EmbedderBackend::Candle => build_candle().await,
    }
}

#[cfg(feature = "candle")]
async fn build_candle() -> Result<Arc<dyn Embedder>> {
    let cache_dir = crate::config::cache_dir()
        .context("Failed to determine cache directory")?
        .join("models");
    let embedder = CandleEmbedder::new(cache_dir);

    info!("Initializing embedder (this may download the model on first run)...");
    embedder
        .init()
        .await
        .context("Failed to initialize embedder")?;
    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "candle"))]
async fn build_candle() -> Result<Arc<dyn Embedder>> {
    anyhow::bail!(
        "docrag was built without the 'candle' feature; use the openai or hashing embedder"
    )
}

/// Index spec for the configured index and embedder.
#[must_use]
pub fn index_spec(config: &Config, embedder: &dyn Embedder) -> IndexSpec {
    IndexSpec {
        name: config.index.name.clone(),
        dimension: embedder.dimension(),
        metric: config.index.metric,
        model: embedder.model_name().to_string(),
    }
}

/// Build (but do not initialize) the configured vector store.
pub fn build_store(config: &Config, spec: IndexSpec) -> Result<Arc<dyn VectorStore>> {
    let data_dir = config.data_dir()?;
    match config.index.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::persistent(spec, &data_dir))),
        #[cfg(feature = "lancedb")]
        StoreBackend::Lancedb => Ok(Arc::new(LanceStore::new(data_dir, spec))),
        #[cfg(not(feature = "lancedb"))]
        StoreBackend::Lancedb => {
            anyhow::bail!(
                "docrag was built without the 'lancedb' feature; use backend = \"memory\""
            )
        }
    }
}

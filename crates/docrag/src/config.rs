//! Configuration handling for docrag.
//!
//! Values come from, in increasing priority: built-in defaults, the TOML
//! config file, environment variables.

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use docrag_core::{ChunkConfig, DistanceMetric};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Index name used when none is configured.
pub const DEFAULT_INDEX_NAME: &str = "rag-chatbot-index";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Documents configuration
    #[serde(default)]
    pub documents: DocumentsConfig,

    /// Index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Embedding configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where documents are read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    #[serde(default = "default_documents_dir")]
    pub dir: PathBuf,
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("./data/sample-documents")
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            dir: default_documents_dir(),
        }
    }
}

/// Vector store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Lancedb,
    Memory,
}

/// Index-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index name
    #[serde(default = "default_index_name")]
    pub name: String,

    /// Directory holding the index (default: platform data directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub backend: StoreBackend,

    /// Distance metric, fixed at index creation
    #[serde(default)]
    pub metric: DistanceMetric,
}

fn default_index_name() -> String {
    DEFAULT_INDEX_NAME.to_string()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: default_index_name(),
            data_dir: None,
            backend: StoreBackend::default(),
            metric: DistanceMetric::default(),
        }
    }
}

/// Chunking-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Chunk size (characters)
    #[serde(default = "default_chunk_size")]
    pub size: usize,

    /// Overlap between chunks (characters)
    #[serde(default)]
    pub overlap: usize,
}

fn default_chunk_size() -> usize {
    1000
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: default_chunk_size(),
            overlap: 0,
        }
    }
}

impl ChunkingConfig {
    #[must_use]
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            size: self.size,
            overlap: self.overlap,
        }
    }
}

/// Embedding backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderBackend {
    /// Local all-MiniLM-L6-v2
    #[default]
    Candle,
    /// OpenAI-compatible HTTP API
    #[serde(rename = "openai")]
    OpenAi,
    /// Deterministic feature hashing, for tests and offline use
    Hashing,
}

impl std::str::FromStr for EmbedderBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "candle" => Ok(Self::Candle),
            "openai" => Ok(Self::OpenAi),
            "hashing" => Ok(Self::Hashing),
            other => bail!("unknown embedder '{other}' (expected candle, openai or hashing)"),
        }
    }
}

/// Embedding-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbedderBackend,

    /// Remote model name (openai backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Embedding dimension (openai and hashing backends)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,

    /// Chunks per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// API base URL (openai backend)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    /// Request timeout in seconds (openai backend)
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries for transient failures (openai backend)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Max concurrent embedding jobs
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// API key; only ever read from the environment
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_batch_size() -> usize {
    100
}

fn default_embed_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> usize {
    3
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbedderBackend::default(),
            model: None,
            dimension: None,
            batch_size: default_batch_size(),
            api_base: None,
            timeout_secs: default_embed_timeout_secs(),
            max_retries: default_max_retries(),
            max_concurrent: default_max_concurrent(),
            api_key: None,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Results per query when the request has no `top_k`
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Largest accepted `top_k`; larger values are clamped
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    /// Deadline for one query (embedding plus search)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_top_k() -> usize {
    5
}

fn default_max_top_k() -> usize {
    50
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", self.bind))
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from the default config path (if it exists) plus the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load from `path`, or the default path when `None`, then apply the
    /// environment and validate.
    ///
    /// An explicit path must exist; a missing default file means defaults.
    pub fn load_from(path: Option<PathBuf>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read(&path)?,
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::read(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = var("DOCRAG_DOCS_DIR") {
            self.documents.dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("DOCRAG_DATA_DIR") {
            self.index.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(name) = var("DOCRAG_INDEX_NAME") {
            self.index.name = name;
        }
        if let Some(backend) = var("DOCRAG_EMBEDDER") {
            self.embedding.backend = backend.parse().context("Invalid DOCRAG_EMBEDDER")?;
        }
        if let Some(bind) = var("DOCRAG_BIND") {
            self.server.bind = bind;
        }
        if let Some(key) = var("OPENAI_API_KEY") {
            self.embedding.api_key = Some(key);
        }
        if let Some(base) = var("OPENAI_BASE_URL") {
            self.embedding.api_base = Some(base);
        }
        Ok(())
    }

    /// Reject configurations that cannot work, before any work starts.
    pub fn validate(&self) -> Result<()> {
        if self.embedding.backend == EmbedderBackend::OpenAi && self.embedding.api_key.is_none() {
            bail!("OPENAI_API_KEY must be set when the embedder is 'openai'");
        }
        if self.chunking.size == 0 {
            bail!("chunking.size must be greater than 0");
        }
        if self.chunking.overlap >= self.chunking.size {
            bail!(
                "chunking.overlap ({}) must be smaller than chunking.size ({})",
                self.chunking.overlap,
                self.chunking.size
            );
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be greater than 0");
        }
        if self.server.default_top_k == 0 || self.server.max_top_k == 0 {
            bail!("server.default_top_k and server.max_top_k must be greater than 0");
        }
        if self.embedding.dimension == Some(0) {
            bail!("embedding.dimension must be greater than 0");
        }
        Ok(())
    }

    /// Directory holding the index.
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.index.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => data_dir().context("Failed to determine data directory"),
        }
    }

    /// Default config file path.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Default configuration as a commented TOML document.
    #[must_use]
    pub fn sample_toml() -> String {
        format!(
            r#"# docrag configuration

[documents]
dir = "./data/sample-documents"

[index]
name = "{DEFAULT_INDEX_NAME}"
# data_dir = "/var/lib/docrag"
backend = "lancedb"   # lancedb | memory
metric = "cosine"     # cosine | l2

[chunking]
size = 1000
overlap = 0

[embedding]
backend = "candle"    # candle | openai | hashing
# model = "text-embedding-ada-002"
# dimension = 1536
batch_size = 100
# api_base = "https://api.openai.com/v1"
timeout_secs = 30
max_retries = 3
max_concurrent = 4

[server]
bind = "127.0.0.1:8000"
default_top_k = 5
max_top_k = 50
request_timeout_secs = 30

[logging]
level = "info"
"#
        )
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "docrag")
}

/// Platform data directory for docrag.
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Platform config directory for docrag.
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Platform cache directory for docrag (model downloads).
pub fn cache_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.cache_dir().to_path_buf())
}

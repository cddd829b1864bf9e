//! Error types for docrag.

use crate::types::DistanceMetric;
use thiserror::Error;

/// Main error type for docrag operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Text extraction failed
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractError),

    /// Chunking failed
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkError),

    /// Embedding generation failed
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbedError),

    /// Vector store operation failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// An operation did not finish within its deadline
    #[error("timed out: {0}")]
    Timeout(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error must abort the current run instead of being logged and skipped.
    ///
    /// Only index configuration mismatches are fatal.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(StoreError::Config(_)))
    }
}

/// Text extraction errors.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("extraction failed: {0}")]
    Failed(String),
}

/// Chunking errors.
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("chunking failed: {0}")]
    Failed(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Embedding errors.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("model loading failed: {0}")]
    ModelLoad(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("input too long: {tokens} tokens, max {max}")]
    InputTooLong { tokens: usize, max: usize },
}

/// Vector store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store initialization failed: {0}")]
    Init(String),

    #[error("insert failed: {0}")]
    Insert(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("delete failed: {0}")]
    Delete(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error(transparent)]
    Config(#[from] StoreConfigError),
}

/// Index configuration errors. These are never recoverable at runtime.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreConfigError {
    #[error("vector dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("distance metric mismatch: index was created with {expected}, configured {actual}")]
    MetricMismatch {
        expected: DistanceMetric,
        actual: DistanceMetric,
    },

    #[error("embedding model mismatch: index was built with '{expected}', configured '{actual}'")]
    ModelMismatch { expected: String, actual: String },

    #[error("invalid index spec: {0}")]
    InvalidSpec(String),

    #[error("index manifest unreadable: {0}")]
    Manifest(String),
}

/// Result type alias for docrag operations.
pub type Result<T> = std::result::Result<T, Error>;

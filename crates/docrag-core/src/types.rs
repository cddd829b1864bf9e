//! Core types for docrag.
//!
//! ## Documents
//! - [`DocumentType`]: Supported source formats (pdf, text, markdown)
//! - [`Document`]: Text extracted from one source file
//!
//! ## Chunks
//! - [`ChunkConfig`]: Chunk size and overlap
//! - [`ChunkOutput`]: One chunk produced by a chunker
//!
//! ## Embeddings
//! - [`EmbeddingOutput`]: Result of embedding a text
//!
//! ## Storage and Search
//! - [`IndexSpec`]: Parameters an index is created with
//! - [`DistanceMetric`]: Fixed distance function of an index
//! - [`StoredRecord`]: The persisted (id, vector, metadata) unit
//! - [`SearchHit`]: One ranked match returned by a query

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

// ============================================================================
// Documents
// ============================================================================

/// Source document format, inferred from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Text,
    Markdown,
}

impl DocumentType {
    /// Infer the document type from a path's extension (case-insensitive).
    ///
    /// Returns `None` for extensions docrag cannot extract.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "text",
            Self::Markdown => "markdown",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plain text extracted from a single source file.
///
/// Lives only until it has been chunked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// File name (no directory), used as the source identifier
    pub file_name: String,
    /// Full path the text was read from
    pub path: PathBuf,
    /// Source format
    pub file_type: DocumentType,
    /// Extracted plain text
    pub text: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// When extraction finished
    pub processed_at: DateTime<Utc>,
}

// ============================================================================
// Chunks
// ============================================================================

/// Configuration for chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Chunk size in characters
    pub size: usize,
    /// Characters shared between consecutive chunks
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            size: 1000,
            overlap: 0,
        }
    }
}

/// A chunk produced by a chunker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutput {
    /// Position of the chunk within its document, starting at 0
    pub index: u32,
    /// Chunk text
    pub content: String,
    /// Character range within the document text
    pub char_range: Range<usize>,
}

impl ChunkOutput {
    /// Length of the chunk in characters.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.char_range.len()
    }
}

// ============================================================================
// Embeddings
// ============================================================================

/// Output from embedding a single text.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    /// The embedding vector
    pub embedding: Vec<f32>,
    /// Number of tokens consumed, when the backend reports it
    pub token_count: usize,
}

// ============================================================================
// Storage and Search
// ============================================================================

/// Distance function of an index. Fixed at creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cosine_similarity`, in `[0, 2]`
    #[default]
    Cosine,
    /// Squared Euclidean distance
    L2,
}

impl DistanceMetric {
    /// Distance between two vectors of equal length. Lower is more similar.
    #[must_use]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => {
                let mut dot = 0.0f32;
                let mut norm_a = 0.0f32;
                let mut norm_b = 0.0f32;
                for (x, y) in a.iter().zip(b) {
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
            }
            Self::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::L2 => "l2",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters an index is created with. Persisted next to the index and
/// compared on every open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index (table) name
    pub name: String,
    /// Vector dimension
    pub dimension: usize,
    /// Distance metric
    pub metric: DistanceMetric,
    /// Name of the embedding model that produced the vectors
    pub model: String,
}

/// Metadata stored with every record and returned with every hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Source file name
    pub source: String,
    /// Chunk index within the source
    pub chunk: u32,
    /// Chunk text
    pub text: String,
}

/// The persisted unit of a vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Deterministic id, see [`StoredRecord::id_for`]
    pub id: String,
    /// Embedding vector
    pub vector: Vec<f32>,
    /// Source and text of the chunk
    pub metadata: RecordMetadata,
}

impl StoredRecord {
    /// Build a record for a chunk, deriving its id from source and chunk index.
    #[must_use]
    pub fn new(source: &str, chunk: u32, text: String, vector: Vec<f32>) -> Self {
        Self {
            id: Self::id_for(source, chunk),
            vector,
            metadata: RecordMetadata {
                source: source.to_string(),
                chunk,
                text,
            },
        }
    }

    /// Record id for a (source, chunk index) pair: `"{source}-{chunk}"`.
    ///
    /// The chunk index is always the trailing all-digit component, so two
    /// distinct pairs never map to the same id.
    #[must_use]
    pub fn id_for(source: &str, chunk: u32) -> String {
        format!("{source}-{chunk}")
    }
}

/// A ranked match from a nearest-neighbor query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Record id
    pub id: String,
    /// Record metadata
    pub metadata: RecordMetadata,
    /// Distance from the query vector under the index metric
    pub distance: f32,
}

/// Vector store statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    /// Index parameters
    pub spec: IndexSpec,
    /// Number of stored records
    pub total_records: u64,
    /// Backend name
    pub backend: String,
}

//! # docrag-core
//!
//! Core types and traits for docrag, a document ingestion and semantic search
//! pipeline over PDF, markdown and plain-text files.
//!
//! ## Architecture
//!
//! ```text
//! ingest:  file → ContentExtractor → Chunker → Embedder → VectorStore::upsert
//! serve:   query string → Embedder → VectorStore::query → ranked SearchHits
//! ```
//!
//! The two paths share only the [`Embedder`] and the [`VectorStore`]. An index
//! remembers the model and dimension it was built with ([`IndexSpec`]), and
//! refuses to be opened with a different one.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Document`] | Plain text extracted from one file |
//! | [`ChunkOutput`] | A contiguous slice of a document |
//! | [`StoredRecord`] | (id, vector, metadata) persisted in the store |
//! | [`SearchHit`] | A stored record with its distance to a query |
//! | [`IndexSpec`] | Name, dimension, metric and model of an index |
//!
//! ## Errors
//!
//! Each stage has its own error enum ([`ExtractError`], [`ChunkError`],
//! [`EmbedError`], [`StoreError`]). [`StoreConfigError`] marks index
//! configuration mismatches, the only errors that abort a run.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{
    ChunkError, EmbedError, Error, ExtractError, Result, StoreConfigError, StoreError,
};
pub use traits::*;
pub use types::*;

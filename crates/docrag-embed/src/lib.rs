//! # docrag-embed
//!
//! Embedding backends for docrag.
//!
//! ## Cargo Features
//!
//! - `candle` (default): local inference with the Candle ML stack
//! - Without `candle`: only the remote and hashing backends are available
//!
//! ## Backends
//!
//! | Type | Model | Dimension | Notes |
//! |------|-------|-----------|-------|
//! | [`CandleEmbedder`] | `sentence-transformers/all-MiniLM-L6-v2` | 384 | Downloaded once from the Hub |
//! | [`OpenAiEmbedder`] | `text-embedding-ada-002` (configurable) | 1536 | Timeout plus retry with backoff |
//! | [`HashingEmbedder`] | `docrag/hashing-{dim}` | any | Deterministic, offline |
//!
//! [`EmbedderPool`] wraps any backend with a concurrency limit, batch
//! slicing with per-batch failure reporting, and output validation.
//!
//! ```rust,ignore
//! use docrag_embed::{EmbedderPool, HashingEmbedder};
//! use std::sync::Arc;
//!
//! let pool = EmbedderPool::new(Arc::new(HashingEmbedder::new(384)), 4);
//! for outcome in pool.embed_batches(&["first chunk", "second chunk"], 100).await {
//!     match outcome.result {
//!         Ok(vectors) => println!("{:?}: {} vectors", outcome.range, vectors.len()),
//!         Err(e) => eprintln!("{:?} failed: {e}", outcome.range),
//!     }
//! }
//! ```

#[cfg(feature = "candle")]
pub mod candle;

#[cfg(feature = "candle")]
pub use candle::CandleEmbedder;

pub mod hashing;
pub mod openai;
pub mod pool;

pub use hashing::HashingEmbedder;
pub use openai::{OpenAiConfig, OpenAiEmbedder};
pub use pool::{BatchOutcome, EmbedderPool};

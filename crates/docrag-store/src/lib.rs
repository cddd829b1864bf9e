//! Vector storage for docrag.
//!
//! Two implementations of [`VectorStore`](docrag_core::VectorStore):
//!
//! - [`MemoryStore`]: brute-force search over an in-memory map, optionally
//!   snapshotted to JSON
//! - [`LanceStore`] (feature `lancedb`, default): one `LanceDB` table per index
//!
//! Both record the [`IndexSpec`](docrag_core::IndexSpec) an index was created
//! with and refuse to open it with a different dimension, metric or model.
//!
//! # Example
//!
//! ```rust,ignore
//! use docrag_store::LanceStore;
//! use docrag_core::VectorStore;
//!
//! let store = LanceStore::new("data".into(), spec);
//! store.init().await?;
//! store.upsert(&records).await?;
//! let hits = store.query(&vector, 5).await?;
//! ```

#[cfg(feature = "lancedb")]
pub mod lancedb;
pub mod manifest;
pub mod memory;
#[cfg(feature = "lancedb")]
pub mod schema;

#[cfg(feature = "lancedb")]
pub use self::lancedb::LanceStore;
pub use manifest::IndexManifest;
pub use memory::MemoryStore;

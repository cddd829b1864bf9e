//! Query service for docrag.
//!
//! [`QueryService`] embeds a query with the same embedder used at ingestion
//! time and returns the nearest stored chunks, ascending by distance.

pub mod service;

pub use service::{QueryConfig, QueryError, QueryService, SearchRequest, SearchResponse};

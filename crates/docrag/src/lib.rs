//! # docrag
//!
//! Ingest PDF, markdown and text documents into a vector index and search
//! them over HTTP or from the command line.
//!
//! This crate ties the workspace together:
//!
//! - [`config`]: TOML config file plus environment overrides
//! - [`app`]: builds the embedder, store, ingestion driver and query service
//! - [`server`]: the axum API (`POST /search`, `GET /healthz`)
//!
//! ```rust,ignore
//! use docrag::{app::Components, config::Config};
//!
//! let config = Config::load()?;
//! let components = Components::open(&config).await?;
//! let report = components.ingest_driver(&config).ingest_dir(&config.documents.dir).await?;
//! ```

pub mod app;
pub mod config;
pub mod server;

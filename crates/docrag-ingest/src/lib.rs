//! Document ingestion for docrag.
//!
//! [`IngestDriver`] walks a documents directory and runs each file through
//! extraction → chunking → embedding → storage. One bad file or one failed
//! embedding batch never stops the pass; an index configuration mismatch does.
//!
//! # Example
//!
//! ```rust,ignore
//! use docrag_ingest::{IngestConfig, IngestDriver};
//!
//! let driver = IngestDriver::new(extractors, chunker, embedder, store, IngestConfig::default());
//! let report = driver.ingest_dir(Path::new("docs")).await?;
//! println!("{} chunks stored", report.chunks_stored);
//! ```

pub mod driver;

pub use driver::{FileReport, FileStatus, IngestConfig, IngestDriver, IngestReport};

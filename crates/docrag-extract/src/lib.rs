//! # docrag-extract
//!
//! Plain-text extraction for the docrag ingestion pipeline.
//!
//! | Extractor | Extensions | Method |
//! |-----------|------------|--------|
//! | [`PdfExtractor`] | `.pdf` | Per-page text joined with newlines |
//! | [`MarkdownExtractor`] | `.md`, `.markdown` | Render to HTML, keep text nodes |
//! | [`TextExtractor`] | `.txt`, `.text` | Read as-is |
//!
//! [`ExtractorRegistry`] picks the extractor from the file extension and
//! wraps the text in a [`Document`](docrag_core::Document).

pub mod markdown;
pub mod pdf;
pub mod registry;
pub mod text;

pub use markdown::MarkdownExtractor;
pub use pdf::PdfExtractor;
pub use registry::ExtractorRegistry;
pub use text::TextExtractor;

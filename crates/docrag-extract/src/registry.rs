//! Extractor registry, routing files to extractors by document type.

use chrono::Utc;
use docrag_core::{ContentExtractor, Document, DocumentType, ExtractError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::{MarkdownExtractor, PdfExtractor, TextExtractor};

/// Registry of content extractors.
pub struct ExtractorRegistry {
    extractors: HashMap<DocumentType, Arc<dyn ContentExtractor>>,
}

impl ExtractorRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Registry with the PDF, markdown and text extractors.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(PdfExtractor::new());
        registry.register(MarkdownExtractor::new());
        registry.register(TextExtractor::new());
        registry
    }

    /// Register an extractor, replacing any previous one for the same type.
    pub fn register<E: ContentExtractor + 'static>(&mut self, extractor: E) {
        self.extractors
            .insert(extractor.document_type(), Arc::new(extractor));
    }

    /// Get an extractor that can handle a file.
    #[must_use]
    pub fn get_for_file(&self, path: &Path) -> Option<Arc<dyn ContentExtractor>> {
        DocumentType::from_path(path)
            .and_then(|doc_type| self.extractors.get(&doc_type).cloned())
    }

    /// Extract a file into a [`Document`].
    ///
    /// Returns [`ExtractError::UnsupportedType`] when no registered extractor
    /// handles the file's extension.
    pub async fn extract(&self, path: &Path) -> Result<Document, ExtractError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ExtractError::Failed(format!("not a file path: {}", path.display()))
            })?;

        let (file_type, extractor) = DocumentType::from_path(path)
            .and_then(|t| self.extractors.get(&t).map(|e| (t, e.clone())))
            .ok_or_else(|| ExtractError::UnsupportedType(file_name.clone()))?;

        let size_bytes = tokio::fs::metadata(path).await?.len();
        let text = extractor.extract(path).await?;
        debug!(
            "Extracted {} chars from {} ({}, {} bytes)",
            text.chars().count(),
            file_name,
            file_type,
            size_bytes
        );

        Ok(Document {
            file_name,
            path: path.to_path_buf(),
            file_type,
            text,
            size_bytes,
            processed_at: Utc::now(),
        })
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

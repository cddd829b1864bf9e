//! Plain-text extractor.

use async_trait::async_trait;
use docrag_core::{ContentExtractor, DocumentType, ExtractError};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

/// Extractor for `.txt` and `.text` files. The content is returned as-is.
pub struct TextExtractor;

impl TextExtractor {
    /// Create a new text extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentExtractor for TextExtractor {
    fn document_type(&self) -> DocumentType {
        DocumentType::Text
    }

    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        fs::read_to_string(path).await.map_err(|e| match e.kind() {
            ErrorKind::InvalidData => {
                ExtractError::Parse(format!("{} is not valid UTF-8", path.display()))
            }
            _ => ExtractError::Io(e),
        })
    }
}

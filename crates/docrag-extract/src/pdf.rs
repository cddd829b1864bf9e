//! PDF extractor.
//!
//! Uses pdf-extract for per-page text, falling back to lopdf's own text
//! extraction when pdf-extract rejects the document.

use async_trait::async_trait;
use docrag_core::{ContentExtractor, DocumentType, ExtractError};
use lopdf::Document;
use std::path::Path;
use tracing::{debug, warn};

/// Extractor for PDF files.
pub struct PdfExtractor;

impl PdfExtractor {
    /// Create a new PDF extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentExtractor for PdfExtractor {
    fn document_type(&self) -> DocumentType {
        DocumentType::Pdf
    }

    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        debug!("Extracting PDF: {:?}", path);

        let bytes = tokio::fs::read(path).await?;

        // Both parsers are CPU-bound and pdf-extract may panic on malformed input.
        let pages = tokio::task::spawn_blocking(move || extract_pages(&bytes))
            .await
            .map_err(|e| ExtractError::Failed(format!("PDF extraction task failed: {e}")))??;

        debug!("Extracted {} pages from {:?}", pages.len(), path);
        Ok(join_pages(&pages))
    }
}

/// Extract the text of every page, in page order.
fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    match pdf_extract::extract_text_from_mem_by_pages(bytes) {
        Ok(pages) => Ok(pages),
        Err(e) => {
            warn!("pdf-extract failed ({e}), falling back to lopdf");
            extract_pages_lopdf(bytes)
        }
    }
}

fn extract_pages_lopdf(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| ExtractError::Parse(format!("invalid PDF: {e}")))?;

    // get_pages is keyed by 1-based page number, so iteration is in page order.
    doc.get_pages()
        .keys()
        .map(|&page_num| {
            doc.extract_text(&[page_num]).map_err(|e| {
                ExtractError::Failed(format!("failed to extract page {page_num}: {e}"))
            })
        })
        .collect()
}

/// Join page texts with newlines and trim the surrounding whitespace.
fn join_pages(pages: &[String]) -> String {
    pages.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};
    use tempfile::tempdir;

    /// Build a PDF with one line of Courier text per page.
    fn build_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_join_pages() {
        let pages = vec!["first page".to_string(), "second page\n".to_string()];
        assert_eq!(join_pages(&pages), "first page\nsecond page");
    }

    #[test]
    fn test_join_pages_empty() {
        assert_eq!(join_pages(&[]), "");
    }

    #[test]
    fn test_lopdf_fallback_rejects_garbage() {
        let err = extract_pages_lopdf(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }

    #[tokio::test]
    async fn test_extract_pages_in_order() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("two-pages.pdf");
        std::fs::write(&file_path, build_pdf(&["Alpha", "Omega"])).unwrap();

        let text = PdfExtractor::new().extract(&file_path).await.unwrap();
        let alpha = text.find("Alpha").expect("first page text");
        let omega = text.find("Omega").expect("second page text");
        assert!(alpha < omega);
        assert!(text[alpha..omega].contains('\n'));
    }

    #[tokio::test]
    async fn test_extract_corrupt_pdf_fails() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("broken.pdf");
        std::fs::write(&file_path, b"%PDF-1.4\nthis is not really a pdf").unwrap();

        let result = PdfExtractor::new().extract(&file_path).await;
        assert!(result.is_err());
    }
}

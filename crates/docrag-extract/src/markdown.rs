//! Markdown extractor.
//!
//! Markdown is rendered to HTML with pulldown-cmark, then every tag is
//! dropped and only text nodes are kept, in document order.

use async_trait::async_trait;
use docrag_core::{ContentExtractor, DocumentType, ExtractError};
use pulldown_cmark::{html, Options, Parser};
use scraper::Html;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

/// Extractor for `.md` and `.markdown` files.
pub struct MarkdownExtractor;

impl MarkdownExtractor {
    /// Create a new markdown extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for MarkdownExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentExtractor for MarkdownExtractor {
    fn document_type(&self) -> DocumentType {
        DocumentType::Markdown
    }

    async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let source = fs::read_to_string(path).await.map_err(|e| match e.kind() {
            ErrorKind::InvalidData => {
                ExtractError::Parse(format!("{} is not valid UTF-8", path.display()))
            }
            _ => ExtractError::Io(e),
        })?;
        Ok(markdown_to_text(&source))
    }
}

/// Render markdown to HTML and strip all markup.
#[must_use]
pub fn markdown_to_text(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut rendered = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut rendered, Parser::new_ext(source, options));

    strip_tags(&rendered)
}

/// Keep the text nodes of an HTML fragment, one line per non-blank line.
fn strip_tags(fragment: &str) -> String {
    let parsed = Html::parse_fragment(fragment);
    let mut raw = String::with_capacity(fragment.len());
    for piece in parsed.root_element().text() {
        raw.push_str(piece);
    }
    collapse_newlines(&raw)
}

fn collapse_newlines(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

//! Fixed-offset chunking.
//!
//! Chunks are `text[i..i + size]` for `i` stepping by `size - overlap`,
//! counted in characters. With no overlap the chunks concatenate back to the
//! original text exactly.

use async_trait::async_trait;
use docrag_core::{ChunkConfig, ChunkError, ChunkOutput, Chunker};
use tracing::trace;

/// Fixed-offset chunker.
pub struct FixedOffsetChunker;

impl FixedOffsetChunker {
    /// Create a new fixed-offset chunker.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for FixedOffsetChunker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Chunker for FixedOffsetChunker {
    fn name(&self) -> &str {
        "fixed_offset"
    }

    async fn chunk(
        &self,
        text: &str,
        config: &ChunkConfig,
    ) -> Result<Vec<ChunkOutput>, ChunkError> {
        split_fixed(text, config)
    }
}

/// Split `text` into fixed-size character windows.
pub fn split_fixed(text: &str, config: &ChunkConfig) -> Result<Vec<ChunkOutput>, ChunkError> {
    validate(config)?;
    if text.is_empty() {
        return Ok(vec![]);
    }

    // Byte offset of every char boundary, including the end of the text.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = boundaries.len() - 1;
    let step = config.size - config.overlap;

    let mut chunks = Vec::with_capacity(total_chars.div_ceil(step));
    let mut start = 0;
    while start < total_chars {
        let end = (start + config.size).min(total_chars);
        let index = u32::try_from(chunks.len())
            .map_err(|_| ChunkError::Failed("too many chunks for one document".to_string()))?;

        chunks.push(ChunkOutput {
            index,
            content: text[boundaries[start]..boundaries[end]].to_string(),
            char_range: start..end,
        });

        if end == total_chars {
            break;
        }
        start += step;
    }

    trace!("Split {} chars into {} chunks", total_chars, chunks.len());
    Ok(chunks)
}

fn validate(config: &ChunkConfig) -> Result<(), ChunkError> {
    if config.size == 0 {
        return Err(ChunkError::InvalidConfig(
            "chunk size must be > 0".to_string(),
        ));
    }
    if config.overlap >= config.size {
        return Err(ChunkError::InvalidConfig(format!(
            "overlap ({}) must be smaller than chunk size ({})",
            config.overlap, config.size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(size: usize, overlap: usize) -> ChunkConfig {
        ChunkConfig { size, overlap }
    }

    fn lengths(chunks: &[ChunkOutput]) -> Vec<usize> {
        chunks.iter().map(|c| c.content.chars().count()).collect()
    }

    #[tokio::test]
    async fn test_chunk_empty_text() {
        let chunker = FixedOffsetChunker::new();
        let chunks = chunker.chunk("", &ChunkConfig::default()).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_chunk_short_text() {
        let chunker = FixedOffsetChunker::new();
        let chunks = chunker
            .chunk("This is a short text.", &ChunkConfig::default())
            .await
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].content, "This is a short text.");
        assert_eq!(chunks[0].char_range, 0..21);
    }

    #[tokio::test]
    async fn test_chunk_2500_chars() {
        let text: String = (0..2500).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = FixedOffsetChunker::new()
            .chunk(&text, &config(1000, 0))
            .await
            .unwrap();

        assert_eq!(lengths(&chunks), vec![1000, 1000, 500]);
        assert_eq!(chunks[1].char_range, 1000..2000);
        assert_eq!(chunks[2].index, 2);
    }

    #[test]
    fn test_exact_multiple_has_no_empty_tail() {
        let text = "x".repeat(2000);
        let chunks = split_fixed(&text, &config(1000, 0)).unwrap();
        assert_eq!(lengths(&chunks), vec![1000, 1000]);
    }

    #[test]
    fn test_concatenation_reconstructs_text() {
        let samples = [
            "plain ascii text that is long enough to need several chunks".to_string(),
            "Grüße aus Köln, 東京から🦀🦀 and back again ".repeat(17),
            "line one\n\nline two\r\n\ttabbed\n".repeat(9),
            "é".repeat(1001),
        ];
        for text in &samples {
            for size in [1, 2, 3, 7, 64, 1000] {
                let chunks = split_fixed(text, &config(size, 0)).unwrap();
                let rebuilt: String = chunks.iter().map(|c| c.content.as_str()).collect();
                assert_eq!(&rebuilt, text, "size {size}");
                assert!(chunks.iter().all(|c| c.char_len() <= size));
            }
        }
    }

    #[test]
    fn test_multibyte_chars_never_split() {
        let text = "🦀é中".repeat(5);
        let chunks = split_fixed(&text, &config(4, 0)).unwrap();
        assert_eq!(lengths(&chunks), vec![4, 4, 4, 3]);
        assert_eq!(chunks[0].content, "🦀é中🦀");
    }

    #[test]
    fn test_indices_are_sequential() {
        let chunks = split_fixed(&"z".repeat(95), &config(10, 0)).unwrap();
        let indices: Vec<u32> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_overlap_repeats_tail() {
        let chunks = split_fixed("abcdefghij", &config(4, 2)).unwrap();
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["abcd", "cdef", "efgh", "ghij"]);
    }

    #[test]
    fn test_zero_size_is_invalid() {
        let err = split_fixed("abc", &config(0, 0)).unwrap_err();
        assert!(matches!(err, ChunkError::InvalidConfig(_)));
    }

    #[test]
    fn test_overlap_not_smaller_than_size_is_invalid() {
        let err = split_fixed("abc", &config(4, 4)).unwrap_err();
        assert!(matches!(err, ChunkError::InvalidConfig(_)));
    }

    #[test]
    fn test_invalid_config_rejected_for_empty_text() {
        assert!(split_fixed("", &config(0, 0)).is_err());
    }
}

//! Fixed-size overlapping character windows

use crate::errors::{RagError, Result};
use crate::types::{Document, DocumentMetadata};

/// Default window length in characters
pub const DEFAULT_CHUNK_SIZE: usize = 1500;
/// Default number of characters shared by consecutive windows
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Configuration for text splitting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk overlap ({chunk_overlap}) must be smaller than a non-zero chunk size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split text into windows, returning each window with its starting character offset
    ///
    /// Blank input yields no windows.
    pub fn split_text(&self, text: &str) -> Vec<(usize, String)> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        // Byte offset of every char, plus the end of the string.
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        let len = offsets.len();
        offsets.push(text.len());

        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(len);
            chunks.push((start, text[offsets[start]..offsets[end]].to_string()));
            if end == len {
                break;
            }
            start += step;
        }
        chunks
    }

    /// Split into documents tagged with `source` (and `page` when given)
    pub fn split_document(&self, text: &str, source: &str, page: Option<u32>) -> Vec<Document> {
        self.split_text(text)
            .into_iter()
            .map(|(start_index, page_content)| Document {
                page_content,
                metadata: DocumentMetadata {
                    source: source.to_string(),
                    start_index,
                    page,
                },
            })
            .collect()
    }

    /// Number of windows produced for a text of `len` characters
    pub fn expected_chunks(&self, len: usize) -> usize {
        match len {
            0 => 0,
            len if len <= self.chunk_size => 1,
            len => {
                let step = self.chunk_size - self.chunk_overlap;
                (len - self.chunk_overlap).div_ceil(step)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_text_basic() {
        let splitter = TextSplitter::new(10, 2).unwrap();
        let chunks = splitter.split_text("Hello world, this is a test");

        assert_eq!(chunks[0], (0, "Hello worl".to_string()));
        assert_eq!(chunks[1], (8, "rld, this ".to_string()));
        assert_eq!(chunks.len(), splitter.expected_chunks(27));
    }

    #[test]
    fn test_chunk_count_formula() {
        let splitter = TextSplitter::default();
        for (len, expected) in [(1, 1), (1500, 1), (1501, 2), (2900, 2), (2901, 3), (4000, 3)] {
            let text = "a".repeat(len);
            assert_eq!(splitter.split_text(&text).len(), expected, "length {len}");
            assert_eq!(splitter.expected_chunks(len), expected);
        }
    }

    #[test]
    fn test_windows_overlap() {
        let splitter = TextSplitter::default();
        let text: String = (0..3000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = splitter.split_text(&text);

        let (_, first) = &chunks[0];
        let (second_start, second) = &chunks[1];
        assert_eq!(*second_start, 1400);
        assert_eq!(&first[1400..], &second[..100]);
    }

    #[test]
    fn test_multibyte_text() {
        let splitter = TextSplitter::new(4, 1).unwrap();
        let chunks = splitter.split_text("héllo wörld");
        assert_eq!(chunks[0].1, "héll");
        assert_eq!(chunks[1], (3, "lo w".to_string()));
        assert_eq!(chunks.len(), splitter.expected_chunks("héllo wörld".chars().count()));
    }

    #[test]
    fn test_blank_text_has_no_chunks() {
        assert!(TextSplitter::default().split_text("  \n").is_empty());
    }

    #[test]
    fn test_invalid_config() {
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(100, 100).is_err());
    }

    #[test]
    fn test_split_document_metadata() {
        let docs = TextSplitter::default().split_document("some text", "policy.pdf", Some(2));
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata.source, "policy.pdf");
        assert_eq!(docs[0].metadata.page, Some(2));
    }
}

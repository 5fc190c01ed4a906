//! Paragraph-aware chunking with word overlap and metadata preservation.
//!
//! Splitting favours paragraph boundaries: heading-like paragraphs are kept
//! with the text they introduce, table rows stay with their preceding
//! paragraph, and only oversized paragraphs are force-split on word
//! boundaries with a configurable overlap carried across the cut.

use std::collections::HashMap;

use crate::error::{IndexError, Result};

/// One span of document text carrying inherited metadata.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: String,
    pub position: usize,
    pub metadata: HashMap<String, String>,
    pub chunk_id: String,
}

impl Chunk {
    fn new(content: String, position: usize, metadata: &HashMap<String, String>) -> Self {
        let mut metadata = metadata.clone();
        metadata.insert("chunk_position".to_owned(), position.to_string());
        Self {
            content,
            position,
            metadata,
            chunk_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Chunker configuration.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Hard ceiling on chunk length in characters (default: 1024).
    pub max_characters: usize,
    /// Words carried across a forced split (default: 128).
    pub overlap: usize,
    /// Soft token ceiling via character-based approximation (default: 800).
    pub max_tokens: usize,
    /// Token density constant (default: 0.25).
    pub approx_tokens_per_char: f32,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_characters: 1024,
            overlap: 128,
            max_tokens: 800,
            approx_tokens_per_char: 0.25,
        }
    }
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a chunker, validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::InvalidConfig` when `overlap >= max_characters`:
    /// the overlap must never exceed the window it overlaps into.
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        if config.overlap >= config.max_characters {
            return Err(IndexError::InvalidConfig(
                "overlap must be smaller than max_characters".into(),
            ));
        }
        Ok(Self { config })
    }

    /// Split `text` into ordered chunks, each carrying `metadata` plus a
    /// `chunk_position` entry. Empty input yields an empty vec.
    #[must_use]
    pub fn chunk(&self, text: &str, metadata: &HashMap<String, String>) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut buffer = String::new();
        let mut position = 0usize;

        for paragraph in split_paragraphs(text) {
            let paragraph = normalize_whitespace(&paragraph);
            if paragraph.is_empty() {
                continue;
            }

            if char_len(&paragraph) > self.config.max_characters
                || self.too_many_tokens(&paragraph)
            {
                for piece in self.split_long_paragraph(&paragraph) {
                    chunks.push(Chunk::new(piece, position, metadata));
                    position += 1;
                }
                continue;
            }

            let candidate = if buffer.is_empty() {
                paragraph.clone()
            } else {
                format!("{buffer} {paragraph}")
            };
            if char_len(&candidate) <= self.config.max_characters
                && !self.too_many_tokens(&candidate)
            {
                buffer = candidate;
                continue;
            }

            if !buffer.is_empty() {
                chunks.push(Chunk::new(std::mem::take(&mut buffer), position, metadata));
                position += 1;
            }
            buffer = paragraph;
        }

        if !buffer.is_empty() {
            chunks.push(Chunk::new(buffer, position, metadata));
        }

        chunks
    }

    /// Force-split an oversized paragraph on word boundaries. The word that
    /// trips a limit is included before the cut, and the buffer reseeds with
    /// the last `overlap` words of the emitted piece.
    fn split_long_paragraph(&self, paragraph: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut chunk_words: Vec<&str> = Vec::new();

        for word in paragraph.split_whitespace() {
            chunk_words.push(word);
            let current = chunk_words.join(" ");
            if char_len(&current) > self.config.max_characters || self.too_many_tokens(&current) {
                pieces.push(current);
                if self.config.overlap == 0 {
                    chunk_words.clear();
                } else {
                    let keep = chunk_words.len().saturating_sub(self.config.overlap);
                    chunk_words.drain(..keep);
                }
            }
        }

        if !chunk_words.is_empty() {
            pieces.push(chunk_words.join(" "));
        }

        pieces
    }

    #[allow(clippy::cast_precision_loss)]
    fn too_many_tokens(&self, text: &str) -> bool {
        let approx_tokens = char_len(text) as f32 * self.config.approx_tokens_per_char;
        approx_tokens > self.config.max_tokens as f32
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A paragraph carrying tabular data: a cell separator (pipe followed by a
/// run of whitespace) or a residual tab.
fn is_table_row(text: &str) -> bool {
    if text.contains('\t') {
        return true;
    }
    text.split('|')
        .skip(1)
        .any(|after| after.chars().take_while(|c| c.is_whitespace()).count() >= 2)
}

/// Split text into paragraphs while keeping headings and tables attached.
///
/// Paragraph boundaries are runs of two-or-more newlines. A paragraph ending
/// in a colon is buffered and merged with what follows; table-like rows join
/// the buffered paragraph instead of starting a new one.
fn split_paragraphs(text: &str) -> Vec<String> {
    let text = text.replace('\t', "    ");
    let mut cleaned = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();

    for paragraph in text.split("\n\n") {
        let candidate = paragraph.trim();
        if candidate.is_empty() {
            continue;
        }

        if is_table_row(candidate) && !buffer.is_empty() {
            buffer.push(candidate);
            cleaned.push(buffer.join("\n"));
            buffer.clear();
            continue;
        }

        if candidate.ends_with(':') {
            buffer.push(candidate);
            continue;
        }

        if buffer.is_empty() {
            cleaned.push(candidate.to_owned());
        } else {
            buffer.push(candidate);
            cleaned.push(buffer.join(" "));
            buffer.clear();
        }
    }

    if !buffer.is_empty() {
        cleaned.push(buffer.join(" "));
    }

    cleaned
}

//! Fixed-window text splitting with overlap.
//!
//! Sizes and offsets count characters so multi-byte text never splits inside a
//! code point and `start_offset` indexes `content.chars()`.

use crate::error::{RagError, Result};
use crate::models::{Chunk, ChunkId, Document};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::InvalidConfiguration(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(RagError::InvalidConfiguration(format!(
                "chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Splits `document` with an ad-hoc configuration.
pub fn chunk(document: &Document, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    let config = ChunkingConfig::new(chunk_size, overlap)?;
    Ok(TextSplitter::new(config).split(document))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextSplitter {
    config: ChunkingConfig,
}

impl TextSplitter {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let text = document.content.as_str();
        // Byte position of every character plus the end of the text.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(idx, _)| idx)
            .chain(std::iter::once(text.len()))
            .collect();
        let total_chars = boundaries.len() - 1;

        let mut chunks = Vec::with_capacity(total_chars / self.config.step() + 1);
        let mut start = 0;
        while start < total_chars {
            let end = (start + self.config.chunk_size).min(total_chars);
            chunks.push(Chunk {
                id: ChunkId::derive(&document.id, start),
                content: text[boundaries[start]..boundaries[end]].to_string(),
                start_offset: start,
                source_document_id: document.id.clone(),
                metadata: document.metadata.clone(),
            });
            if end == total_chars {
                break;
            }
            start += self.config.step();
        }
        chunks
    }

    pub fn split_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|doc| self.split(doc)).collect()
    }
}

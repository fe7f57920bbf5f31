use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::RagError;

pub type Metadata = BTreeMap<String, String>;

/// Metadata key every loader fills with the locator a document came from.
pub const SOURCE_KEY: &str = "source";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId(pub String);

impl ChunkId {
    pub fn derive(document: &DocumentId, start_offset: usize) -> Self {
        Self(format!("{}#{}", document.0, start_offset))
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub content: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        let id = id.into();
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), id.clone());
        Self {
            id: DocumentId(id),
            content: content.into(),
            metadata,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }

    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// A window of a document's text. `start_offset` counts characters, not bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub content: String,
    pub start_offset: usize,
    pub source_document_id: DocumentId,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    pub chunk_id: ChunkId,
    pub values: Vec<f32>,
}

impl EmbeddingVector {
    pub fn dimensions(&self) -> usize {
        self.values.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: EmbeddingVector,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Search hits ordered by non-increasing score.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Callers hand over hits already ranked; the order is kept as given.
    pub fn from_ranked(hits: Vec<ScoredChunk>) -> Self {
        Self { hits }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn hits(&self) -> &[ScoredChunk] {
        &self.hits
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredChunk> {
        self.hits.iter()
    }

    pub fn chunks(&self) -> Vec<Chunk> {
        self.hits.iter().map(|hit| hit.chunk.clone()).collect()
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.hits.into_iter().map(|hit| hit.chunk).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    Cosine,
    InnerProduct,
}

impl SimilarityMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::InnerProduct => "dot",
        }
    }
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimilarityMetric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" | "inner_product" | "inner-product" => Ok(Self::InnerProduct),
            other => Err(RagError::InvalidConfiguration(format!(
                "unknown similarity metric '{other}'"
            ))),
        }
    }
}

/// Identity of the embedding configuration an index was built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingProfile {
    pub model: String,
    pub dimensions: Option<usize>,
    pub metric: SimilarityMetric,
}

impl EmbeddingProfile {
    /// Checks that vectors described by `other` may live in an index built with `self`.
    pub fn ensure_compatible(&self, other: &EmbeddingProfile) -> Result<(), RagError> {
        if self.model != other.model {
            return Err(RagError::EmbeddingMismatch(format!(
                "index uses model '{}' but entries come from '{}'",
                self.model, other.model
            )));
        }
        if self.metric != other.metric {
            return Err(RagError::EmbeddingMismatch(format!(
                "index ranks by {} but entries were built for {}",
                self.metric, other.metric
            )));
        }
        match (self.dimensions, other.dimensions) {
            (Some(ours), Some(theirs)) if ours != theirs => {
                Err(RagError::EmbeddingMismatch(format!(
                    "index holds {ours}-dimensional vectors, entries have {theirs}"
                )))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(model: &str, dimensions: Option<usize>, metric: SimilarityMetric) -> EmbeddingProfile {
        EmbeddingProfile {
            model: model.to_string(),
            dimensions,
            metric,
        }
    }

    #[test]
    fn documents_record_their_source() {
        let doc = Document::new("https://example.com/post", "body").with_metadata("title", "Post");
        assert_eq!(doc.source(), Some("https://example.com/post"));
        assert_eq!(doc.metadata.get("title").map(String::as_str), Some("Post"));
        assert_eq!(doc.char_len(), 4);
    }

    #[test]
    fn chunk_ids_are_derived_from_document_and_offset() {
        let id = ChunkId::derive(&DocumentId("notes.md".into()), 800);
        assert_eq!(id.to_string(), "notes.md#800");
    }

    #[test]
    fn metric_parses_known_names() {
        assert_eq!("cosine".parse::<SimilarityMetric>().unwrap(), SimilarityMetric::Cosine);
        assert_eq!("DOT".parse::<SimilarityMetric>().unwrap(), SimilarityMetric::InnerProduct);
        assert!(matches!(
            "euclid".parse::<SimilarityMetric>(),
            Err(RagError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn profiles_reject_foreign_models_and_dimensions() {
        let index = profile("text-embedding-3-large", Some(3072), SimilarityMetric::Cosine);
        assert!(index
            .ensure_compatible(&profile("text-embedding-3-large", None, SimilarityMetric::Cosine))
            .is_ok());
        assert!(matches!(
            index.ensure_compatible(&profile("nomic-embed-text", Some(3072), SimilarityMetric::Cosine)),
            Err(RagError::EmbeddingMismatch(_))
        ));
        assert!(matches!(
            index.ensure_compatible(&profile("text-embedding-3-large", Some(768), SimilarityMetric::Cosine)),
            Err(RagError::EmbeddingMismatch(_))
        ));
        assert!(matches!(
            index.ensure_compatible(&profile("text-embedding-3-large", Some(3072), SimilarityMetric::InnerProduct)),
            Err(RagError::EmbeddingMismatch(_))
        ));
    }
}

//! In-memory embedding index.
//!
//! Searches share a read lock that is only taken after the query has been
//! embedded, so concurrent queries never wait on each other or on the embedding
//! service. `add` calls are serialized by an async gate and publish a whole
//! batch under one short write lock, so a failed batch leaves no trace.

use crate::embedder::Embedder;
use crate::search::SearchEngine;
use domain::models::{
    Chunk, ChunkId, EmbeddingProfile, EmbeddingVector, IndexEntry, RetrievalResult, ScoredChunk,
    SimilarityMetric,
};
use domain::services::EmbeddingService;
use domain::{RagError, Result};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Default)]
struct StoreState {
    entries: Vec<IndexEntry>,
    positions: HashMap<ChunkId, usize>,
    dimensions: Option<usize>,
}

impl StoreState {
    fn upsert(&mut self, entry: IndexEntry) {
        match self.positions.get(&entry.chunk.id) {
            Some(&pos) => self.entries[pos] = entry,
            None => {
                self.positions.insert(entry.chunk.id.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }
}

pub struct VectorStore {
    embedder: Embedder,
    metric: SimilarityMetric,
    state: RwLock<StoreState>,
    ingest_gate: Mutex<()>,
}

impl VectorStore {
    /// `dimensions` pins the vector length up front; otherwise the first batch fixes it.
    pub fn new(
        embeddings: Arc<dyn EmbeddingService>,
        metric: SimilarityMetric,
        dimensions: Option<usize>,
    ) -> Self {
        Self::with_embedder(Embedder::new(embeddings), metric, dimensions)
    }

    pub fn with_embedder(embedder: Embedder, metric: SimilarityMetric, dimensions: Option<usize>) -> Self {
        Self {
            embedder,
            metric,
            state: RwLock::new(StoreState {
                dimensions,
                ..StoreState::default()
            }),
            ingest_gate: Mutex::new(()),
        }
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    pub fn profile(&self) -> EmbeddingProfile {
        EmbeddingProfile {
            model: self.embedder.model().to_string(),
            dimensions: self.read().dimensions,
            metric: self.metric,
        }
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    pub fn get(&self, id: &ChunkId) -> Option<IndexEntry> {
        let state = self.read();
        state.positions.get(id).map(|&pos| state.entries[pos].clone())
    }

    /// Copy of every entry in insertion order.
    pub fn entries(&self) -> Vec<IndexEntry> {
        self.read().entries.clone()
    }

    /// Embeds and indexes `chunks`. Either every chunk becomes searchable or none does.
    /// Re-adding a chunk id replaces its previous entry.
    pub async fn add(&self, chunks: Vec<Chunk>) -> Result<Vec<ChunkId>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let _gate = self.ingest_gate.lock().await;

        let vectors = self.embedder.generate_embeddings(&chunks).await?;
        let dimensions = self.validate_batch(&vectors)?;

        let ids: Vec<ChunkId> = chunks.iter().map(|c| c.id.clone()).collect();
        let mut state = self.write();
        state.dimensions = Some(dimensions);
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            state.upsert(IndexEntry { chunk, vector });
        }
        info!(added = ids.len(), total = state.entries.len(), "indexed chunks");
        Ok(ids)
    }

    /// Re-imports entries exported from a store with a compatible profile.
    pub async fn restore(&self, profile: &EmbeddingProfile, entries: Vec<IndexEntry>) -> Result<usize> {
        self.profile().ensure_compatible(profile)?;
        if entries.is_empty() {
            return Ok(0);
        }
        let _gate = self.ingest_gate.lock().await;

        let vectors: Vec<EmbeddingVector> = entries.iter().map(|e| e.vector.clone()).collect();
        let dimensions = self.validate_batch(&vectors)?;
        if let Some(expected) = profile.dimensions {
            if expected != dimensions {
                return Err(RagError::EmbeddingMismatch(format!(
                    "snapshot declares {expected} dimensions but holds {dimensions}-dimensional vectors"
                )));
            }
        }
        if let Some(entry) = entries.iter().find(|e| e.vector.chunk_id != e.chunk.id) {
            return Err(RagError::Storage(format!(
                "vector for {} is attached to chunk {}",
                entry.vector.chunk_id, entry.chunk.id
            )));
        }

        let count = entries.len();
        let mut state = self.write();
        state.dimensions = Some(dimensions);
        for entry in entries {
            state.upsert(entry);
        }
        Ok(count)
    }

    /// Top `k` chunks for `query`. An empty store answers with an empty result.
    pub async fn similarity_search(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(RagError::InvalidConfiguration(
                "k must be greater than zero".to_string(),
            ));
        }
        if self.is_empty() {
            return Ok(RetrievalResult::empty());
        }

        let query_vector = self.embedder.embed_query(query).await?;

        let state = self.read();
        if let Some(dimensions) = state.dimensions {
            if query_vector.len() != dimensions {
                return Err(RagError::EmbeddingMismatch(format!(
                    "query vector has {} dimensions, index holds {dimensions}",
                    query_vector.len()
                )));
            }
        }
        let ranked = SearchEngine::rank(
            self.metric,
            &query_vector,
            state.entries.iter().map(|e| e.vector.values.as_slice()),
            k,
        );
        debug!(k, hits = ranked.len(), "similarity search");
        Ok(RetrievalResult::from_ranked(
            ranked
                .into_iter()
                .map(|(pos, score)| ScoredChunk {
                    chunk: state.entries[pos].chunk.clone(),
                    score,
                })
                .collect(),
        ))
    }

    /// All vectors must share one length, matching the store's if it has one.
    fn validate_batch(&self, vectors: &[EmbeddingVector]) -> Result<usize> {
        let expected = self.read().dimensions;
        let first = vectors.first().map(EmbeddingVector::dimensions).unwrap_or(0);
        let dimensions = expected.unwrap_or(first);
        if dimensions == 0 {
            return Err(RagError::EmbeddingService(
                "embedding service returned empty vectors".to_string(),
            ));
        }
        if let Some(bad) = vectors.iter().find(|v| v.dimensions() != dimensions) {
            return Err(RagError::EmbeddingMismatch(format!(
                "vector for {} has {} dimensions, expected {dimensions}",
                bad.chunk_id,
                bad.dimensions()
            )));
        }
        Ok(dimensions)
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

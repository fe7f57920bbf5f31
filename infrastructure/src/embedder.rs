use domain::models::{Chunk, EmbeddingVector};
use domain::services::EmbeddingService;
use domain::{RagError, Result};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_BATCH_SIZE: usize = 32;
const CONCURRENT_BATCHES: usize = 4;

/// Batches chunk texts through an [`EmbeddingService`].
#[derive(Clone)]
pub struct Embedder {
    service: Arc<dyn EmbeddingService>,
    batch_size: usize,
}

impl Embedder {
    pub fn new(service: Arc<dyn EmbeddingService>) -> Self {
        Self {
            service,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn model(&self) -> &str {
        self.service.embedding_model()
    }

    /// One vector per chunk, in chunk order. The first failing batch fails the whole call.
    pub async fn generate_embeddings(&self, chunks: &[Chunk]) -> Result<Vec<EmbeddingVector>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let mut vectors = Vec::with_capacity(chunks.len());

        let batches = texts
            .chunks(self.batch_size)
            .map(|batch| self.embed_batch(batch));
        let results = stream::iter(batches)
            .buffered(CONCURRENT_BATCHES)
            .collect::<Vec<Result<Vec<Vec<f32>>>>>()
            .await;
        for batch in results {
            vectors.extend(batch?);
        }

        Ok(chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, values)| EmbeddingVector {
                chunk_id: chunk.id.clone(),
                values,
            })
            .collect())
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        info!("Generating embeddings for {} chunks...", batch.len());
        let embedded = self.service.embed(batch).await?;
        if embedded.len() != batch.len() {
            return Err(RagError::EmbeddingService(format!(
                "service returned {} vectors for a batch of {}",
                embedded.len(),
                batch.len()
            )));
        }
        Ok(embedded)
    }

    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.service.embed_query(text).await
    }
}

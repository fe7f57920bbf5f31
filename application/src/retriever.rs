use domain::models::{Chunk, RetrievalResult};
use domain::{RagError, Result};
use infrastructure::vector_store::VectorStore;
use std::sync::Arc;

/// Retrieval policy seam between the store and prompt assembly.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<VectorStore>,
    k: usize,
}

impl Retriever {
    pub fn new(store: Arc<VectorStore>, k: usize) -> Result<Self> {
        if k == 0 {
            return Err(RagError::InvalidConfiguration(
                "retriever k must be greater than zero".to_string(),
            ));
        }
        Ok(Self { store, k })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub async fn retrieve(&self, question: &str) -> Result<Vec<Chunk>> {
        Ok(self.retrieve_scored(question).await?.into_chunks())
    }

    pub async fn retrieve_scored(&self, question: &str) -> Result<RetrievalResult> {
        self.store.similarity_search(question, self.k).await
    }
}

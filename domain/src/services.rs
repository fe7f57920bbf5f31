//! Boundaries to the external services the pipeline consumes.

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::models::Document;

/// Text to vectors. Indexing and querying must go through the same model.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    fn embedding_model(&self) -> &str;

    /// Embeds `texts` in order; one vector per input.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        match (vectors.pop(), vectors.is_empty()) {
            (Some(vector), true) => Ok(vector),
            _ => Err(RagError::EmbeddingService(
                "expected exactly one vector for the query".to_string(),
            )),
        }
    }
}

/// Prompt text in, answer text out.
#[async_trait]
pub trait GenerationService: Send + Sync {
    fn generation_model(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Resolves locators (URLs, paths) into documents.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn load(&self, locators: &[String]) -> Result<Vec<Document>>;
}

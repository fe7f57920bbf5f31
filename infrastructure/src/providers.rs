use crate::config::{Config, Provider};
use crate::ollama_client::OllamaClient;
use crate::openai_client::OpenAiClient;
use domain::services::{EmbeddingService, GenerationService};
use domain::{RagError, Result};
use std::sync::Arc;
use tracing::info;

pub struct Services {
    pub embeddings: Arc<dyn EmbeddingService>,
    pub generation: Arc<dyn GenerationService>,
}

/// Builds the embedding and generation adapters for the configured provider.
pub fn build_services(config: &Config) -> Result<Services> {
    let services = match config.provider {
        Provider::OpenAi => {
            let api_key = config.openai_api_key.as_deref().ok_or_else(|| {
                RagError::MissingCredential("OPENAI_API_KEY is not set".to_string())
            })?;
            let client = Arc::new(OpenAiClient::new(
                api_key,
                &config.openai_base_url,
                config.chat_model.clone(),
                config.embedding_model.clone(),
                config.pipeline.dimensions,
                config.request_timeout,
            )?);
            Services {
                embeddings: client.clone(),
                generation: client,
            }
        }
        Provider::Ollama => {
            let client = Arc::new(OllamaClient::new(
                &config.ollama_base_url,
                config.chat_model.clone(),
                config.embedding_model.clone(),
                config.request_timeout,
            )?);
            Services {
                embeddings: client.clone(),
                generation: client,
            }
        }
    };
    info!(
        provider = ?config.provider,
        chat_model = %config.chat_model,
        embedding_model = %config.embedding_model,
        "configured model services"
    );
    Ok(services)
}

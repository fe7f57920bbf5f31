//! OpenAI-compatible embeddings and chat completions.

use crate::http::{build_client, read_success, transport_error, ServiceKind};
use async_trait::async_trait;
use domain::services::{EmbeddingService, GenerationService};
use domain::{RagError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiClient {
    client: Arc<Client>,
    base_url: String,
    chat_model: String,
    embedding_model: String,
    dimensions: Option<usize>,
}

impl OpenAiClient {
    pub fn new(
        api_key: &str,
        base_url: &str,
        chat_model: impl Into<String>,
        embedding_model: impl Into<String>,
        dimensions: Option<usize>,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(RagError::MissingCredential("OpenAI API key is empty".to_string()));
        }
        Ok(Self {
            client: Arc::new(build_client(timeout, Some(api_key))?),
            base_url: base_url.trim_end_matches('/').to_string(),
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
            dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingService for OpenAiClient {
    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
            dimensions: self.dimensions,
        };
        debug!(inputs = texts.len(), model = %self.embedding_model, "requesting embeddings");
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| transport_error(ServiceKind::Embedding, &url, err))?;
        let body = read_success(ServiceKind::Embedding, &url, response).await?;
        let mut parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|err| RagError::EmbeddingService(format!("malformed embedding response: {err}")))?;
        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != texts.len() {
            return Err(RagError::EmbeddingService(format!(
                "service returned {} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }
        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[async_trait]
impl GenerationService for OpenAiClient {
    fn generation_model(&self) -> &str {
        &self.chat_model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.chat_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| transport_error(ServiceKind::Generation, &url, err))?;
        let body = read_success(ServiceKind::Generation, &url, response).await?;
        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|err| RagError::Service(format!("malformed chat response: {err}")))?;
        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| RagError::Service("chat response contained no message".to_string()))
    }
}

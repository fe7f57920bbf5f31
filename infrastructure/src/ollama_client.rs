use crate::http::{build_client, read_success, transport_error, ServiceKind};
use async_trait::async_trait;
use domain::services::{EmbeddingService, GenerationService};
use domain::{RagError, Result};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const CONCURRENT_EMBEDDINGS: usize = 8;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Message,
    done: bool,
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Arc<Client>,
    base_url: String,
    chat_model: String,
    embedding_model: String,
}

impl OllamaClient {
    pub fn new(
        base_url: &str,
        chat_model: impl Into<String>,
        embedding_model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: Arc::new(build_client(timeout, None)?),
            base_url: base_url.trim_end_matches('/').to_string(),
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
        })
    }

    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            prompt: text,
        };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| transport_error(ServiceKind::Embedding, &url, err))?;
        let body = read_success(ServiceKind::Embedding, &url, response).await?;
        let parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|err| RagError::EmbeddingService(format!("malformed embedding response: {err}")))?;
        if parsed.embedding.is_empty() {
            return Err(RagError::EmbeddingService(format!(
                "model '{}' returned an empty embedding",
                self.embedding_model
            )));
        }
        Ok(parsed.embedding)
    }

    pub async fn generate_response(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model: &self.chat_model,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
        };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| transport_error(ServiceKind::Generation, &url, err))?;
        let text = read_success(ServiceKind::Generation, &url, response).await?;
        collect_chat_content(&text)
    }
}

/// Ollama answers with one JSON object per line even when streaming is off.
/// A body with no parseable line, or one that never reports `done`, is an error.
fn collect_chat_content(body: &str) -> Result<String> {
    let mut full_content = String::new();
    let mut parsed_any = false;
    for line in body.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Ok(chat_resp) = serde_json::from_str::<ChatResponse>(line) else {
            continue;
        };
        parsed_any = true;
        full_content.push_str(&chat_resp.message.content);
        if chat_resp.done {
            return Ok(full_content);
        }
    }
    let reason = if parsed_any {
        "stream ended before the model reported done"
    } else {
        "no chat message in body"
    };
    Err(RagError::Service(format!(
        "malformed chat response ({reason}): {}",
        body.chars().take(120).collect::<String>()
    )))
}

#[async_trait]
impl EmbeddingService for OllamaClient {
    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let requests: Vec<_> = texts.iter().map(|text| self.generate_embedding(text)).collect();
        // `buffered` keeps input order.
        let results = stream::iter(requests)
            .buffered(CONCURRENT_EMBEDDINGS)
            .collect::<Vec<_>>()
            .await;
        results.into_iter().collect()
    }
}

#[async_trait]
impl GenerationService for OllamaClient {
    fn generation_model(&self) -> &str {
        &self.chat_model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.generate_response(prompt).await
    }
}

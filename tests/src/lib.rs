//! Deterministic stand-ins for the external services, shared by the integration tests.

use async_trait::async_trait;
use domain::models::Document;
use domain::services::{DocumentSource, EmbeddingService, GenerationService};
use domain::{RagError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Bag-of-words vectors: each lowercase word is hashed into one of `dims` buckets,
/// then the vector is L2-normalised.
pub struct HashingEmbeddings {
    model: String,
    dims: usize,
    fail_on: Option<String>,
    calls: AtomicUsize,
}

impl HashingEmbeddings {
    pub fn new(dims: usize) -> Self {
        Self {
            model: "hashing-bow".to_string(),
            dims,
            fail_on: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn named(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Any batch containing `needle` fails with an embedding service error.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            vector[(fnv1a(&word) % self.dims as u64) as usize] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf29ce484222325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl EmbeddingService for HashingEmbeddings {
    fn embedding_model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(needle) = &self.fail_on {
            if texts.iter().any(|t| t.contains(needle.as_str())) {
                return Err(RagError::EmbeddingService(format!("refused to embed '{needle}'")));
            }
        }
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}

/// Records every prompt and answers with a fixed reply or a fixed error.
pub struct ScriptedGenerator {
    reply: Result<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn answering(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: RagError) -> Self {
        Self {
            reply: Err(error),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    fn generation_model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.reply.clone()
    }
}

/// Serves pre-built documents keyed by their id; unknown locators fail to fetch.
pub struct StaticSource {
    documents: Vec<Document>,
}

impl StaticSource {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl DocumentSource for StaticSource {
    async fn load(&self, locators: &[String]) -> Result<Vec<Document>> {
        locators
            .iter()
            .map(|locator| {
                self.documents
                    .iter()
                    .find(|doc| doc.id.0 == *locator)
                    .cloned()
                    .ok_or_else(|| RagError::fetch(locator.as_str(), "unreachable"))
            })
            .collect()
    }
}

/// `len` characters of repeating lowercase text.
pub fn filler(len: usize) -> String {
    "the quick brown fox jumps over the lazy dog "
        .chars()
        .cycle()
        .take(len)
        .collect()
}

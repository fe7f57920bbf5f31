use domain::chunking::{ChunkingConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use domain::models::SimilarityMetric;
use domain::prompt::PromptTemplate;
use domain::{RagError, Result};
use dotenvy::dotenv;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_OPENAI_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-large";
pub const DEFAULT_OLLAMA_CHAT_MODEL: &str = "qwen2.5-coder:7b";
pub const DEFAULT_OLLAMA_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_TOP_K: usize = 4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONTENT_CLASSES: &[&str] = &["post-content", "post-title", "post-header"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Ollama,
}

impl FromStr for Provider {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(RagError::InvalidConfiguration(format!(
                "unknown provider '{other}' (expected openai or ollama)"
            ))),
        }
    }
}

/// Knobs shared by every pipeline stage.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub chunking: ChunkingConfig,
    pub top_k: usize,
    pub metric: SimilarityMetric,
    pub dimensions: Option<usize>,
    pub template: PromptTemplate,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            top_k: DEFAULT_TOP_K,
            metric: SimilarityMetric::Cosine,
            dimensions: None,
            template: PromptTemplate::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub ollama_base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub request_timeout: Duration,
    pub content_classes: Vec<String>,
    pub pipeline: PipelineSettings,
}

impl Config {
    /// Reads `.env` (if any) and the process environment.
    pub fn load() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = get("RAG_PROVIDER")
            .map(|v| v.parse::<Provider>())
            .transpose()?
            .unwrap_or(Provider::OpenAi);

        let openai_api_key = get("OPENAI_API_KEY");
        if provider == Provider::OpenAi && openai_api_key.is_none() {
            return Err(RagError::MissingCredential(
                "OPENAI_API_KEY must be set when RAG_PROVIDER=openai".to_string(),
            ));
        }

        let (default_chat, default_embedding) = match provider {
            Provider::OpenAi => (DEFAULT_OPENAI_CHAT_MODEL, DEFAULT_OPENAI_EMBEDDING_MODEL),
            Provider::Ollama => (DEFAULT_OLLAMA_CHAT_MODEL, DEFAULT_OLLAMA_EMBEDDING_MODEL),
        };

        let chunk_size = parse_number::<usize, _>(&get, "RAG_CHUNK_SIZE")?.unwrap_or(DEFAULT_CHUNK_SIZE);
        let overlap = parse_number::<usize, _>(&get, "RAG_CHUNK_OVERLAP")?.unwrap_or(DEFAULT_CHUNK_OVERLAP);
        let top_k = parse_number::<usize, _>(&get, "RAG_TOP_K")?.unwrap_or(DEFAULT_TOP_K);
        if top_k == 0 {
            return Err(RagError::InvalidConfiguration(
                "RAG_TOP_K must be greater than zero".to_string(),
            ));
        }
        let dimensions = parse_number::<usize, _>(&get, "RAG_EMBEDDING_DIMENSIONS")?;
        if dimensions == Some(0) {
            return Err(RagError::InvalidConfiguration(
                "RAG_EMBEDDING_DIMENSIONS must be greater than zero".to_string(),
            ));
        }
        let metric = get("RAG_SIMILARITY")
            .map(|v| v.parse::<SimilarityMetric>())
            .transpose()?
            .unwrap_or(SimilarityMetric::Cosine);
        let timeout_secs = parse_number::<u64, _>(&get, "RAG_REQUEST_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let content_classes = match get("RAG_CONTENT_CLASSES") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect(),
            None => DEFAULT_CONTENT_CLASSES.iter().map(|c| c.to_string()).collect(),
        };

        let template = match get("RAG_PROMPT_TEMPLATE") {
            Some(path) => load_template(Path::new(&path))?,
            None => PromptTemplate::default(),
        };

        Ok(Self {
            provider,
            openai_api_key,
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            ollama_base_url: get("OLLAMA_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string()),
            chat_model: get("RAG_CHAT_MODEL").unwrap_or_else(|| default_chat.to_string()),
            embedding_model: get("RAG_EMBEDDING_MODEL")
                .unwrap_or_else(|| default_embedding.to_string()),
            request_timeout: Duration::from_secs(timeout_secs),
            content_classes,
            pipeline: PipelineSettings {
                chunking: ChunkingConfig::new(chunk_size, overlap)?,
                top_k,
                metric,
                dimensions,
                template,
            },
        })
    }
}

fn parse_number<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|_| {
                RagError::InvalidConfiguration(format!("{key} must be a non-negative integer, got '{raw}'"))
            })
        })
        .transpose()
}

fn load_template(path: &Path) -> Result<PromptTemplate> {
    let body = std::fs::read_to_string(path).map_err(|err| {
        RagError::InvalidConfiguration(format!("cannot read prompt template {}: {err}", path.display()))
    })?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("custom")
        .to_string();
    PromptTemplate::new(name, 1, &body)
}

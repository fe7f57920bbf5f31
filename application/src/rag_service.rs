//! Ingestion and query phases over one shared vector store.

use crate::generator::Generator;
use crate::retriever::Retriever;
use domain::chunking::TextSplitter;
use domain::models::{Answer, Chunk, ChunkId, Document, Query, RetrievalResult};
use domain::prompt::PromptAssembler;
use domain::services::{DocumentSource, EmbeddingService, GenerationService};
use domain::{RagError, Result};
use infrastructure::config::{Config, PipelineSettings};
use infrastructure::embedding_storage::EmbeddingStorage;
use infrastructure::providers::build_services;
use infrastructure::sources::SourceRouter;
use infrastructure::vector_store::VectorStore;
use shared::telemetry::Telemetry;
use shared::utils::preview;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub documents: usize,
    pub total_chars: usize,
    pub chunk_ids: Vec<ChunkId>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct AskOutcome {
    pub answer: Answer,
    pub context: RetrievalResult,
}

pub struct RagService {
    source: Arc<dyn DocumentSource>,
    splitter: TextSplitter,
    store: Arc<VectorStore>,
    retriever: Retriever,
    assembler: PromptAssembler,
    generator: Generator,
}

impl RagService {
    pub fn new(
        settings: &PipelineSettings,
        source: Arc<dyn DocumentSource>,
        embeddings: Arc<dyn EmbeddingService>,
        generation: Arc<dyn GenerationService>,
    ) -> Result<Self> {
        let store = Arc::new(VectorStore::new(
            embeddings,
            settings.metric,
            settings.dimensions,
        ));
        Ok(Self {
            source,
            splitter: TextSplitter::new(settings.chunking),
            retriever: Retriever::new(Arc::clone(&store), settings.top_k)?,
            store,
            assembler: PromptAssembler::new(settings.template.clone()),
            generator: Generator::new(generation),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let services = build_services(config)?;
        let source = Arc::new(SourceRouter::from_config(config)?);
        Self::new(&config.pipeline, source, services.embeddings, services.generation)
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Load, chunk and index. Any failure leaves the store as it was.
    pub async fn ingest(&self, locators: &[String]) -> Result<IngestReport> {
        let telemetry = Telemetry::new();
        let loaded = self.source.load(locators).await?;
        let documents = distinct_non_blank(loaded);
        if documents.is_empty() {
            return Err(RagError::NoDocumentsFound);
        }

        let total_chars: usize = documents.iter().map(Document::char_len).sum();
        info!("Total characters: {}", total_chars);
        for document in &documents {
            debug!(source = %document.id, "{}", preview(&document.content, PREVIEW_CHARS));
        }

        let chunks = self.chunk_documents(&documents);
        info!("Split {} document(s) into [{}] chunks.", documents.len(), chunks.len());

        let chunk_ids = self.store.add(chunks).await?;
        info!(
            "vectorised chunks with first three ids={:?}",
            chunk_ids.iter().take(3).map(ChunkId::to_string).collect::<Vec<_>>()
        );

        Ok(IngestReport {
            documents: documents.len(),
            total_chars,
            chunk_ids,
            elapsed: telemetry.elapsed(),
        })
    }

    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        self.splitter.split_all(documents)
    }

    /// Retrieve, assemble, generate. A failed query never touches the store.
    pub async fn ask(&self, question: &str) -> Result<AskOutcome> {
        let telemetry = Telemetry::new();
        let query = Query::new(question);
        let context = self.retriever.retrieve_scored(&query.text).await?;
        if context.is_empty() {
            warn!("no indexed context for question; answering without it");
        }
        let prompt = self.assembler.assemble(&query.text, &context.chunks());
        let answer = self.generator.generate(&prompt).await?;
        info!(
            retrieved = context.len(),
            elapsed_ms = telemetry.elapsed_ms() as u64,
            "answered question"
        );
        Ok(AskOutcome { answer, context })
    }

    /// Writes every indexed entry to a SQLite file, replacing its previous contents.
    pub async fn save_snapshot(&self, path: &Path) -> Result<usize> {
        let profile = self.store.profile();
        let entries = self.store.entries();
        let path = path.to_path_buf();
        let count = entries.len();
        run_blocking(move || EmbeddingStorage::new(&path)?.save(&profile, &entries)).await?;
        info!(entries = count, "saved index snapshot");
        Ok(count)
    }

    pub async fn load_snapshot(&self, path: &Path) -> Result<usize> {
        if !path.is_file() {
            return Err(RagError::Storage(format!(
                "no index snapshot at {}",
                path.display()
            )));
        }
        let owned: PathBuf = path.to_path_buf();
        let (profile, entries) = run_blocking(move || {
            let storage = EmbeddingStorage::new(&owned)?;
            let profile = storage.load_profile()?.ok_or_else(|| {
                RagError::Storage(format!("{} holds no index profile", owned.display()))
            })?;
            Ok((profile, storage.load_entries()?))
        })
        .await?;
        let restored = self.store.restore(&profile, entries).await?;
        info!(entries = restored, "restored index snapshot");
        Ok(restored)
    }
}

/// Drops blank documents and repeats of an id already seen (a locator given twice,
/// or a file also reached through its directory). The first occurrence wins.
fn distinct_non_blank(documents: Vec<Document>) -> Vec<Document> {
    let mut seen = HashSet::new();
    documents
        .into_iter()
        .filter(|doc| {
            if doc.is_blank() {
                warn!(source = %doc.id, "skipping empty document");
                return false;
            }
            if !seen.insert(doc.id.clone()) {
                debug!(source = %doc.id, "skipping duplicate document");
                return false;
            }
            true
        })
        .collect()
}

async fn run_blocking<T, F>(job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|err| RagError::Storage(format!("snapshot task failed: {err}")))?
}

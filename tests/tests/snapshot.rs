use application::rag_service::RagService;
use domain::models::Document;
use domain::RagError;
use infrastructure::config::PipelineSettings;
use std::sync::Arc;
use tests::{HashingEmbeddings, ScriptedGenerator, StaticSource};

fn service(documents: Vec<Document>, embeddings: HashingEmbeddings) -> RagService {
    RagService::new(
        &PipelineSettings::default(),
        Arc::new(StaticSource::new(documents)),
        Arc::new(embeddings),
        Arc::new(ScriptedGenerator::answering("ok")),
    )
    .unwrap()
}

fn corpus() -> Vec<Document> {
    vec![
        Document::new("planning", "Planning splits a goal into smaller subgoals.")
            .with_metadata("title", "Planning"),
        Document::new("memory", "Long-term memory keeps observations in a vector store."),
        Document::new("tools", "Agents call tools such as search and calculators."),
    ]
}

#[tokio::test]
async fn snapshot_restores_identical_search_results() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.db");

    let saved = service(corpus(), HashingEmbeddings::new(256));
    saved
        .ingest(&["planning".to_string(), "memory".to_string(), "tools".to_string()])
        .await
        .unwrap();
    assert_eq!(saved.save_snapshot(&path).await.unwrap(), 3);

    let restored = service(vec![], HashingEmbeddings::new(256));
    assert_eq!(restored.load_snapshot(&path).await.unwrap(), 3);
    assert_eq!(restored.store().profile(), saved.store().profile());
    let chunks = |svc: &RagService| -> Vec<_> {
        svc.store().entries().into_iter().map(|entry| entry.chunk).collect()
    };
    assert_eq!(chunks(&restored), chunks(&saved));

    let question = "Where are observations kept?";
    let before = saved.store().similarity_search(question, 3).await.unwrap();
    let after = restored.store().similarity_search(question, 3).await.unwrap();
    assert_eq!(before.chunks(), after.chunks());
    for (b, a) in before.iter().zip(after.iter()) {
        assert!((b.score - a.score).abs() < 1e-5);
    }
}

#[tokio::test]
async fn snapshot_from_another_model_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.db");

    let saved = service(corpus(), HashingEmbeddings::new(256));
    saved.ingest(&["tools".to_string()]).await.unwrap();
    saved.save_snapshot(&path).await.unwrap();

    let other = service(vec![], HashingEmbeddings::new(256).named("another-model"));
    assert!(matches!(
        other.load_snapshot(&path).await,
        Err(RagError::EmbeddingMismatch(_))
    ));
    assert!(other.store().is_empty());
}

#[tokio::test]
async fn missing_snapshot_is_a_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(vec![], HashingEmbeddings::new(64));
    assert!(matches!(
        svc.load_snapshot(&dir.path().join("absent.db")).await,
        Err(RagError::Storage(_))
    ));
}

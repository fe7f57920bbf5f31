use application::rag_service::RagService;
use domain::chunking::ChunkingConfig;
use domain::models::{Document, SimilarityMetric};
use domain::prompt::PromptTemplate;
use domain::RagError;
use infrastructure::config::PipelineSettings;
use std::sync::Arc;
use tests::{filler, HashingEmbeddings, ScriptedGenerator, StaticSource};

const DIMS: usize = 512;

fn settings(chunk_size: usize, overlap: usize, top_k: usize) -> PipelineSettings {
    PipelineSettings {
        chunking: ChunkingConfig::new(chunk_size, overlap).unwrap(),
        top_k,
        ..PipelineSettings::default()
    }
}

fn service(
    settings: &PipelineSettings,
    documents: Vec<Document>,
    embeddings: Arc<HashingEmbeddings>,
    generator: Arc<ScriptedGenerator>,
) -> RagService {
    RagService::new(
        settings,
        Arc::new(StaticSource::new(documents)),
        embeddings,
        generator,
    )
    .unwrap()
}

fn locators(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[tokio::test]
async fn ingesting_2500_chars_yields_three_offset_chunks() {
    let svc = service(
        &settings(1000, 200, 4),
        vec![Document::new("post", filler(2500))],
        Arc::new(HashingEmbeddings::new(DIMS)),
        Arc::new(ScriptedGenerator::answering("ok")),
    );
    let report = svc.ingest(&locators(&["post"])).await.unwrap();

    assert_eq!(report.documents, 1);
    assert_eq!(report.total_chars, 2500);
    let ids: Vec<String> = report.chunk_ids.iter().map(|id| id.to_string()).collect();
    assert_eq!(ids, vec!["post#0", "post#800", "post#1600"]);
    let offsets: Vec<usize> = svc
        .store()
        .entries()
        .iter()
        .map(|entry| entry.chunk.start_offset)
        .collect();
    assert_eq!(offsets, vec![0, 800, 1600]);
}

#[tokio::test]
async fn repeated_locators_are_indexed_once() {
    let svc = service(
        &settings(1000, 200, 4),
        vec![Document::new("post", filler(2500))],
        Arc::new(HashingEmbeddings::new(DIMS)),
        Arc::new(ScriptedGenerator::answering("ok")),
    );
    let report = svc.ingest(&locators(&["post", "post"])).await.unwrap();

    assert_eq!(report.documents, 1);
    assert_eq!(report.total_chars, 2500);
    assert_eq!(report.chunk_ids.len(), 3);
    assert_eq!(svc.store().len(), report.chunk_ids.len());
}

#[tokio::test]
async fn weather_question_retrieves_weather_chunk() {
    let svc = service(
        &settings(1000, 200, 1),
        vec![
            Document::new("weather", "The weather today is sunny and warm with a light breeze."),
            Document::new("cooking", "Cooking pasta requires boiling salted water before adding noodles."),
        ],
        Arc::new(HashingEmbeddings::new(DIMS)),
        Arc::new(ScriptedGenerator::answering("Sunny.")),
    );
    svc.ingest(&locators(&["weather", "cooking"])).await.unwrap();

    let chunks = svc.retriever().retrieve("What's the weather?").await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].source_document_id.0, "weather");
}

#[tokio::test]
async fn every_chunk_is_its_own_top_match() {
    let texts = [
        "Planning breaks large tasks into subgoals.",
        "Memory stores past observations for later recall.",
        "Tool use lets the agent call external APIs.",
        "Reflection critiques earlier actions to improve.",
    ];
    let documents = texts
        .iter()
        .enumerate()
        .map(|(i, text)| Document::new(format!("d{i}"), *text))
        .collect();
    let svc = service(
        &settings(1000, 0, 1),
        documents,
        Arc::new(HashingEmbeddings::new(DIMS)),
        Arc::new(ScriptedGenerator::answering("ok")),
    );
    svc.ingest(&locators(&["d0", "d1", "d2", "d3"])).await.unwrap();

    for text in texts {
        let result = svc.store().similarity_search(text, 1).await.unwrap();
        assert_eq!(result.hits()[0].chunk.content, text);
    }
    let all = svc.store().similarity_search(texts[0], 10).await.unwrap();
    assert_eq!(all.len(), texts.len());
    assert!(all.hits().windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn ask_fills_template_with_context_in_retrieval_order() {
    let generator = Arc::new(ScriptedGenerator::answering("Alpha is first."));
    let pipeline = PipelineSettings {
        template: PromptTemplate::new("qa", 1, "Context: {context}\nQuestion: {question}").unwrap(),
        ..settings(1000, 0, 2)
    };
    let svc = service(
        &pipeline,
        vec![Document::new("a", "alpha fact"), Document::new("b", "beta fact")],
        Arc::new(HashingEmbeddings::new(DIMS)),
        generator.clone(),
    );
    svc.ingest(&locators(&["a", "b"])).await.unwrap();

    let outcome = svc.ask("alpha fact?").await.unwrap();
    assert_eq!(outcome.answer.text, "Alpha is first.");
    assert_eq!(outcome.context.len(), 2);
    assert_eq!(
        generator.prompts(),
        vec!["Context: alpha fact\n\nbeta fact\nQuestion: alpha fact?".to_string()]
    );
}

#[tokio::test]
async fn failed_embedding_aborts_ingestion_without_partial_index() {
    let svc = service(
        &settings(20, 5, 4),
        vec![
            Document::new("good", filler(200)),
            Document::new("bad", "this page carries poison in its text"),
        ],
        Arc::new(HashingEmbeddings::new(DIMS).failing_on("poison")),
        Arc::new(ScriptedGenerator::answering("ok")),
    );
    let err = svc.ingest(&locators(&["good", "bad"])).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingService(_)));
    assert!(svc.store().is_empty());
}

#[tokio::test]
async fn load_errors_propagate_and_blank_sources_are_rejected() {
    let svc = service(
        &settings(100, 10, 4),
        vec![Document::new("blank", "  \n\t ")],
        Arc::new(HashingEmbeddings::new(DIMS)),
        Arc::new(ScriptedGenerator::answering("ok")),
    );
    assert!(matches!(
        svc.ingest(&locators(&["missing"])).await,
        Err(RagError::Fetch { .. })
    ));
    assert_eq!(svc.ingest(&locators(&["blank"])).await.unwrap_err(), RagError::NoDocumentsFound);
    assert_eq!(svc.ingest(&[]).await.unwrap_err(), RagError::NoDocumentsFound);
}

#[tokio::test]
async fn generation_failure_reaches_caller_and_keeps_index() {
    let svc = service(
        &settings(100, 10, 4),
        vec![Document::new("doc", filler(300))],
        Arc::new(HashingEmbeddings::new(DIMS)),
        Arc::new(ScriptedGenerator::failing(RagError::ServiceUnavailable("down".to_string()))),
    );
    svc.ingest(&locators(&["doc"])).await.unwrap();
    let before = svc.store().len();

    let err = svc.ask("what does the fox do?").await.unwrap_err();
    assert_eq!(err, RagError::ServiceUnavailable("down".to_string()));
    assert_eq!(svc.store().len(), before);
}

#[tokio::test]
async fn asking_an_empty_index_still_reaches_the_generator() {
    let generator = Arc::new(ScriptedGenerator::answering("I don't know."));
    let embeddings = Arc::new(HashingEmbeddings::new(DIMS));
    let svc = service(&settings(100, 10, 4), vec![], embeddings.clone(), generator.clone());

    let outcome = svc.ask("anything?").await.unwrap();
    assert!(outcome.context.is_empty());
    assert_eq!(outcome.answer.text, "I don't know.");
    assert_eq!(embeddings.calls(), 0);
    assert_eq!(generator.prompts().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_questions_share_one_index() {
    let svc = Arc::new(service(
        &settings(1000, 0, 1),
        vec![
            Document::new("weather", "The weather today is sunny and warm."),
            Document::new("cooking", "Cooking pasta requires boiling salted water."),
        ],
        Arc::new(HashingEmbeddings::new(DIMS)),
        Arc::new(ScriptedGenerator::answering("ok")),
    ));
    svc.ingest(&locators(&["weather", "cooking"])).await.unwrap();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let svc = Arc::clone(&svc);
            let (question, expected) = if i % 2 == 0 {
                ("How is the weather today?", "weather")
            } else {
                ("How long for boiling pasta?", "cooking")
            };
            tokio::spawn(async move {
                let outcome = svc.ask(question).await.unwrap();
                (outcome.context.hits()[0].chunk.source_document_id.0.clone(), expected)
            })
        })
        .collect();
    for handle in handles {
        let (got, expected) = handle.await.unwrap();
        assert_eq!(got, expected);
    }
}

#[tokio::test]
async fn inner_product_store_ranks_normalised_vectors_like_cosine() {
    let pipeline = PipelineSettings {
        metric: SimilarityMetric::InnerProduct,
        ..settings(1000, 0, 1)
    };
    let svc = service(
        &pipeline,
        vec![
            Document::new("weather", "The weather today is sunny and warm with a light breeze."),
            Document::new("cooking", "Cooking pasta requires boiling salted water before adding noodles."),
        ],
        Arc::new(HashingEmbeddings::new(DIMS)),
        Arc::new(ScriptedGenerator::answering("ok")),
    );
    svc.ingest(&locators(&["weather", "cooking"])).await.unwrap();
    let chunks = svc.retriever().retrieve("What's the weather?").await.unwrap();
    assert_eq!(chunks[0].source_document_id.0, "weather");
}

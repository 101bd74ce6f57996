use async_trait::async_trait;
use mark_protocol::{BudgetTruncation, ConfidenceTier, PipelineStage};
use mark_search::{RetrievalConfig, RetrievalRequest, RetrievalService, SearchError};
use mark_vector_store::{
    ChunkRecord, ChunkStore, DataLayout, IndexedCorpus, MetadataTable, Result as StoreResult,
    TextEmbedder, VectorStoreError,
};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Maps exact texts to fixed vectors. Unknown text is an embedding failure.
struct TableEmbedder {
    dimension: usize,
    table: HashMap<String, Vec<f32>>,
    delay: Option<Duration>,
    down: bool,
}

impl TableEmbedder {
    fn new(dimension: usize, entries: &[(&str, Vec<f32>)]) -> Self {
        Self {
            dimension,
            table: entries
                .iter()
                .map(|(text, vector)| ((*text).to_string(), vector.clone()))
                .collect(),
            delay: None,
            down: false,
        }
    }

    fn down(mut self) -> Self {
        self.down = true;
        self
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl TextEmbedder for TableEmbedder {
    fn model_id(&self) -> &str {
        "table"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> StoreResult<Vec<Vec<f32>>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.down {
            return Err(VectorStoreError::EmbeddingError("service unavailable".to_string()));
        }
        texts
            .iter()
            .map(|text| {
                self.table
                    .get(text)
                    .cloned()
                    .ok_or_else(|| VectorStoreError::EmbeddingError(format!("unknown text {text}")))
            })
            .collect()
    }
}

struct Fixture {
    _temp: TempDir,
    layout: DataLayout,
    corpus: IndexedCorpus,
}

impl Fixture {
    /// Writes each chunk under `data/chunks` and appends its vector to an in-memory corpus.
    fn with_chunks(chunks: &[(&str, &str, Vec<f32>)]) -> Self {
        let temp = TempDir::new().unwrap();
        let layout = DataLayout::for_project_root(temp.path());
        std::fs::create_dir_all(layout.chunks_dir()).unwrap();

        let mut corpus = IndexedCorpus::new();
        for (name, text, vector) in chunks {
            std::fs::write(layout.chunks_dir().join(name), text).unwrap();
            corpus
                .append(&[vector.clone()], vec![ChunkRecord::new(*name, text)])
                .unwrap();
        }
        Self {
            _temp: temp,
            layout,
            corpus,
        }
    }

    fn service(&self, embedder: TableEmbedder, config: &RetrievalConfig) -> RetrievalService {
        RetrievalService::new(
            Arc::new(self.corpus.clone()),
            Arc::new(embedder),
            ChunkStore::new(self.layout.chunks_dir()),
            config,
        )
        .unwrap()
    }
}

fn two_company_fixture() -> Fixture {
    Fixture::with_chunks(&[
        ("AAA_10-K_2023_chunk1.txt", "AAA revenue grew", vec![0.3, 0.0]),
        ("BBB_10-K_2023_chunk1.txt", "BBB margins fell", vec![0.7, 0.0]),
        ("AAA_10-K_2023_chunk2.txt", "AAA opened plants", vec![0.4, 0.0]),
        ("BBB_10-K_2023_chunk2.txt", "BBB cut costs", vec![0.75, 0.0]),
        ("AAA_10-K_2023_chunk3.txt", "AAA hired staff", vec![0.5, 0.0]),
        ("BBB_10-K_2023_chunk3.txt", "BBB sold units", vec![0.8, 0.0]),
    ])
}

fn topic_config() -> RetrievalConfig {
    let mut config = RetrievalConfig::default();
    config.fallback.topics = vec!["Energy".to_string(), "Healthcare".to_string()];
    config
}

fn topic_embedder(query: &str, vector: Vec<f32>) -> TableEmbedder {
    TableEmbedder::new(
        2,
        &[
            (query, vector),
            ("Energy", vec![1.0, 0.0]),
            ("Healthcare", vec![0.0, 1.0]),
        ],
    )
}

#[tokio::test]
async fn entity_quotas_split_results_between_companies() {
    let fixture = two_company_fixture();
    let service = fixture.service(
        TableEmbedder::new(2, &[("cost trends", vec![0.0, 0.0])]),
        &RetrievalConfig::default(),
    );

    let request = RetrievalRequest::for_tickers(["aaa", "BBB"])
        .with_total_k(4)
        .with_per_entity_k(2);
    let response = service.answer("cost trends", &request).await;

    assert_eq!(
        response.source_identifiers,
        vec![
            "AAA_10-K_2023_chunk1.txt",
            "AAA_10-K_2023_chunk2.txt",
            "BBB_10-K_2023_chunk1.txt",
            "BBB_10-K_2023_chunk2.txt",
        ]
    );
    assert_eq!(response.passages[0].text, "AAA revenue grew");
    assert_eq!(response.confidence, ConfidenceTier::High);
    assert!(!response.fallback_used);
    assert_eq!(response.fallback_topic, None);
    assert_eq!(response.used_tokens, 12);
}

#[tokio::test]
async fn unrequested_entities_never_appear() {
    let fixture = two_company_fixture();
    let service = fixture.service(
        TableEmbedder::new(2, &[("q", vec![0.0, 0.0])]),
        &RetrievalConfig::default(),
    );

    let response = service
        .answer("q", &RetrievalRequest::for_tickers(["BBB"]).with_total_k(8))
        .await;

    assert_eq!(response.passages.len(), 2);
    assert!(response
        .source_identifiers
        .iter()
        .all(|id| id.starts_with("BBB_")));
}

#[tokio::test]
async fn token_budget_caps_the_context() {
    let fixture = two_company_fixture();
    let mut config = RetrievalConfig::default();
    config.context.token_budget = 7;
    let service = fixture.service(TableEmbedder::new(2, &[("q", vec![0.0, 0.0])]), &config);

    let response = service.answer("q", &RetrievalRequest::default()).await;

    assert_eq!(
        response.source_identifiers,
        vec!["AAA_10-K_2023_chunk1.txt", "AAA_10-K_2023_chunk2.txt"]
    );
    assert_eq!(response.used_tokens, 6);
    assert_eq!(response.truncation, Some(BudgetTruncation::MaxTokens));
}

#[tokio::test]
async fn embedding_outage_degrades_to_empty_response() {
    let fixture = two_company_fixture();
    let service = fixture.service(
        TableEmbedder::new(2, &[("q", vec![0.0, 0.0])]).down(),
        &topic_config(),
    );

    let response = service.answer("q", &RetrievalRequest::default()).await;

    assert!(response.passages.is_empty());
    assert_eq!(response.confidence, ConfidenceTier::Insufficient);
    assert!(!response.fallback_used);
}

#[tokio::test]
async fn empty_corpus_returns_insufficient() {
    let fixture = Fixture::with_chunks(&[]);
    let service = fixture.service(
        topic_embedder("anything", vec![1.0, 0.0]),
        &topic_config(),
    );

    let response = service
        .answer("anything", &RetrievalRequest::for_tickers(["AAA"]))
        .await;

    assert!(response.passages.is_empty());
    assert_eq!(response.confidence, ConfidenceTier::Insufficient);
    assert!(!response.fallback_used);
    assert_eq!(response.fallback_topic, None);
}

#[tokio::test]
async fn persisted_empty_index_opens_and_serves() {
    let fixture = Fixture::with_chunks(&[]);
    fixture.corpus.persist(&fixture.layout).await.unwrap();

    let service = RetrievalService::open(
        &fixture.layout,
        Arc::new(TableEmbedder::new(2, &[])),
        &RetrievalConfig::default(),
    )
    .await
    .unwrap();

    assert!(service.corpus().is_empty());
    let response = service.answer("q", &RetrievalRequest::default()).await;
    assert_eq!(response.confidence, ConfidenceTier::Insufficient);
}

#[tokio::test]
async fn missing_index_is_fatal_on_open() {
    let fixture = Fixture::with_chunks(&[]);
    let result = RetrievalService::open(
        &fixture.layout,
        Arc::new(TableEmbedder::new(2, &[])),
        &RetrievalConfig::default(),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn disagreeing_artifacts_are_fatal_on_open() {
    let fixture = two_company_fixture();
    fixture.corpus.persist(&fixture.layout).await.unwrap();
    let mut short = MetadataTable::new();
    short.extend(fixture.corpus.records().take(5).cloned());
    tokio::fs::write(fixture.layout.metadata_path(), short.to_bytes().unwrap())
        .await
        .unwrap();

    let result = RetrievalService::open(
        &fixture.layout,
        Arc::new(TableEmbedder::new(2, &[])),
        &RetrievalConfig::default(),
    )
    .await;
    match result {
        Err(SearchError::VectorStoreError(err)) => {
            assert!(err.is_fatal_artifact_error());
            assert!(matches!(
                err,
                VectorStoreError::CardinalityMismatch {
                    vectors: 6,
                    metadata: 5
                }
            ));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("mismatched artifacts opened"),
    }
}

#[tokio::test]
async fn weak_match_retries_on_fallback_topic() {
    let fixture = Fixture::with_chunks(&[(
        "XOM_10-K_2023_chunk1.txt",
        "Upstream production rose",
        vec![1.0, 0.0],
    )]);
    let service = fixture.service(topic_embedder("crude exposure", vec![3.0, 0.0]), &topic_config());

    let response = service
        .answer("crude exposure", &RetrievalRequest::default())
        .await;

    assert!(response.fallback_used);
    assert_eq!(response.fallback_topic.as_deref(), Some("Energy"));
    assert_eq!(response.source_identifiers, vec!["XOM_10-K_2023_chunk1.txt"]);
    assert_eq!(response.confidence, ConfidenceTier::High);
}

#[tokio::test]
async fn dissimilar_query_does_not_activate_fallback() {
    let fixture = Fixture::with_chunks(&[(
        "XOM_10-K_2023_chunk1.txt",
        "Upstream production rose",
        vec![1.0, 0.0],
    )]);
    let service = fixture
        .service(topic_embedder("unrelated", vec![0.0, -3.0]), &topic_config())
        .with_trace(true);

    let response = service.answer("unrelated", &RetrievalRequest::default()).await;

    assert!(response.passages.is_empty());
    assert!(!response.fallback_used);
    assert_eq!(response.confidence, ConfidenceTier::Insufficient);
    assert_eq!(
        response.trace,
        vec![
            PipelineStage::QueryReceived,
            PipelineStage::PrimaryRetrieval,
            PipelineStage::FallbackLookup,
            PipelineStage::EmptyResult,
        ]
    );
}

#[tokio::test]
async fn disabled_fallback_returns_empty_for_weak_match() {
    let fixture = Fixture::with_chunks(&[(
        "XOM_10-K_2023_chunk1.txt",
        "Upstream production rose",
        vec![1.0, 0.0],
    )]);
    let mut config = topic_config();
    config.fallback.enabled = false;
    let service = fixture.service(topic_embedder("crude exposure", vec![3.0, 0.0]), &config);

    let response = service
        .answer("crude exposure", &RetrievalRequest::default())
        .await;

    assert!(response.passages.is_empty());
    assert!(!response.fallback_used);
}

#[tokio::test]
async fn confident_answer_traces_direct_path() {
    let fixture = two_company_fixture();
    let service = fixture
        .service(
            TableEmbedder::new(2, &[("q", vec![0.0, 0.0])]),
            &RetrievalConfig::default(),
        )
        .with_trace(true);

    let response = service.answer("q", &RetrievalRequest::default()).await;

    assert_eq!(
        response.trace,
        vec![
            PipelineStage::QueryReceived,
            PipelineStage::PrimaryRetrieval,
            PipelineStage::Assemble,
        ]
    );
}

#[tokio::test]
async fn blank_query_is_empty_without_embedding() {
    let fixture = two_company_fixture();
    let service = fixture.service(
        TableEmbedder::new(2, &[]).down(),
        &RetrievalConfig::default(),
    );

    let response = service.answer("   ", &RetrievalRequest::default()).await;
    assert!(response.is_empty());
    assert_eq!(response.confidence, ConfidenceTier::Insufficient);
}

#[tokio::test(start_paused = true)]
async fn deadline_expiry_returns_empty_response() {
    let fixture = two_company_fixture();
    let service = fixture.service(
        TableEmbedder::new(2, &[("q", vec![0.0, 0.0])]).slow(Duration::from_secs(30)),
        &RetrievalConfig::default(),
    );

    let response = service
        .answer_within("q", &RetrievalRequest::default(), Duration::from_millis(500))
        .await;

    assert!(response.passages.is_empty());
    assert_eq!(response.confidence, ConfidenceTier::Insufficient);
}

#[tokio::test]
async fn embedder_dimension_must_match_corpus() {
    let fixture = two_company_fixture();
    let result = RetrievalService::new(
        Arc::new(fixture.corpus.clone()),
        Arc::new(TableEmbedder::new(3, &[])),
        ChunkStore::new(fixture.layout.chunks_dir()),
        &RetrievalConfig::default(),
    );
    assert!(result.is_err());
}

#[tokio::test]
async fn missing_chunk_file_is_skipped() {
    let fixture = two_company_fixture();
    std::fs::remove_file(fixture.layout.chunks_dir().join("AAA_10-K_2023_chunk1.txt")).unwrap();
    let service = fixture.service(
        TableEmbedder::new(2, &[("q", vec![0.0, 0.0])]),
        &RetrievalConfig::default(),
    );

    let response = service
        .answer("q", &RetrievalRequest::for_tickers(["AAA"]))
        .await;

    assert_eq!(response.source_identifiers, vec!["AAA_10-K_2023_chunk2.txt"]);
}

use crate::assembler::ContextAssembler;
use crate::config::{RetrievalConfig, TokenizerKind, TokenizerSettings};
use crate::error::{Result, SearchError};
use crate::fallback::{FallbackDecision, TopicMatcher};
use crate::retriever::{RetrievalRequest, Retriever};
use crate::tokens::{HfTokenCounter, TokenCounter, WordCounter};
use mark_protocol::{ConfidenceTier, ContextResponse, PipelineStage};
use mark_vector_store::{ChunkStore, DataLayout, IndexedCorpus, TextEmbedder, VectorStoreError};
use std::sync::Arc;
use std::time::Duration;

/// Builds the single token counter a service uses for every budget calculation.
pub fn token_counter_for(settings: &TokenizerSettings) -> Result<Arc<dyn TokenCounter>> {
    match (settings.kind, settings.path.as_deref()) {
        (TokenizerKind::Words, _) => Ok(Arc::new(WordCounter)),
        (TokenizerKind::Huggingface, Some(path)) => {
            Ok(Arc::new(HfTokenCounter::from_file(path)?))
        }
        (TokenizerKind::Huggingface, None) => Err(SearchError::InvalidConfig(
            "tokenizer.path is required for the huggingface tokenizer".to_string(),
        )),
    }
}

/// Query-time entry point: retrieval, fallback and assembly for one request.
///
/// Construct once per process and share by reference. Query-time failures never surface as
/// errors; they degrade to an empty Insufficient response.
pub struct RetrievalService {
    retriever: Retriever,
    assembler: ContextAssembler,
    fallback: Option<TopicMatcher>,
    sufficient_tier: ConfidenceTier,
    defaults: RetrievalRequest,
    trace: bool,
}

impl RetrievalService {
    /// Loads the persisted index under `layout` and wires the service from `config`.
    ///
    /// Missing or inconsistent index artifacts are fatal.
    pub async fn open(
        layout: &DataLayout,
        embedder: Arc<dyn TextEmbedder>,
        config: &RetrievalConfig,
    ) -> Result<Self> {
        let corpus = Arc::new(IndexedCorpus::load(layout).await?);
        Self::new(corpus, embedder, ChunkStore::new(layout.chunks_dir()), config)
    }

    pub fn new(
        corpus: Arc<IndexedCorpus>,
        embedder: Arc<dyn TextEmbedder>,
        store: ChunkStore,
        config: &RetrievalConfig,
    ) -> Result<Self> {
        if corpus.dimension() != 0 && corpus.dimension() != embedder.dimension() {
            return Err(VectorStoreError::InvalidDimension {
                expected: corpus.dimension(),
                actual: embedder.dimension(),
            }
            .into());
        }

        let counter = token_counter_for(&config.tokenizer)?;
        let assembler = ContextAssembler::new(store, counter, config.context, config.confidence);
        let retriever = Retriever::new(corpus, embedder.clone())
            .with_oversample(config.retrieval.oversample);
        let fallback = config.fallback.enabled.then(|| {
            TopicMatcher::new(config.fallback.topics.clone(), embedder)
                .with_activation_threshold(config.fallback.activation_threshold)
        });

        log::info!(
            "Retrieval service ready: {} entries, tokens={}, fallback={}",
            retriever.corpus().len(),
            assembler.token_strategy(),
            if fallback.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            retriever,
            assembler,
            fallback,
            sufficient_tier: config.fallback.sufficient_tier,
            defaults: RetrievalRequest {
                tickers: Vec::new(),
                total_k: config.retrieval.total_k,
                per_entity_k: config.retrieval.per_entity_k,
            },
            trace: false,
        })
    }

    /// Replaces the topic matcher, e.g. with one backed by a lighter embedding model.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Option<TopicMatcher>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Include the visited [`PipelineStage`]s in every response.
    #[must_use]
    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    /// A request with the configured `total_k` / `per_entity_k` for `tickers`.
    #[must_use]
    pub fn request_for<S: Into<String>>(
        &self,
        tickers: impl IntoIterator<Item = S>,
    ) -> RetrievalRequest {
        RetrievalRequest {
            tickers: tickers.into_iter().map(Into::into).collect(),
            ..self.defaults.clone()
        }
    }

    #[must_use]
    pub fn corpus(&self) -> &IndexedCorpus {
        self.retriever.corpus()
    }

    /// Like [`answer`](Self::answer), but gives up with an empty response after `deadline`.
    pub async fn answer_within(
        &self,
        query: &str,
        request: &RetrievalRequest,
        deadline: Duration,
    ) -> ContextResponse {
        match tokio::time::timeout(deadline, self.answer(query, request)).await {
            Ok(response) => response,
            Err(_) => {
                log::warn!("Retrieval deadline of {deadline:?} elapsed");
                let mut trace = Trace::new(self.trace);
                trace.push(PipelineStage::QueryReceived);
                Self::empty(trace)
            }
        }
    }

    pub async fn answer(&self, query: &str, request: &RetrievalRequest) -> ContextResponse {
        let mut trace = Trace::new(self.trace);
        trace.push(PipelineStage::QueryReceived);
        if query.trim().is_empty() {
            log::debug!("Empty query");
            return Self::empty(trace);
        }

        trace.push(PipelineStage::PrimaryRetrieval);
        let candidates = match self.retriever.retrieve(query, request).await {
            Ok(candidates) => candidates,
            Err(err) => {
                log::warn!("Primary retrieval failed: {err}");
                return Self::empty(trace);
            }
        };
        let primary_tier = self
            .assembler
            .policy()
            .tier_for_best(candidates.iter().map(|c| c.distance));

        if primary_tier.meets(self.sufficient_tier) {
            trace.push(PipelineStage::Assemble);
            let assembled = self.assembler.assemble(&candidates).await;
            return trace.finish(assembled.into_response(None));
        }

        log::debug!("Primary confidence {primary_tier}; looking up fallback topic");
        trace.push(PipelineStage::FallbackLookup);
        let Some(matcher) = &self.fallback else {
            return Self::empty(trace);
        };
        let topic = match matcher.decide(query).await {
            FallbackDecision::Activated(found) => found.topic,
            FallbackDecision::Inapplicable { .. } => return Self::empty(trace),
        };

        trace.push(PipelineStage::RetryRetrievalOnTopic);
        let candidates = match self.retriever.retrieve(&topic, request).await {
            Ok(candidates) => candidates,
            Err(err) => {
                log::warn!("Retrieval on fallback topic '{topic}' failed: {err}");
                return Self::empty(trace);
            }
        };
        let assembled = self.assembler.assemble(&candidates).await;
        if assembled.passages.is_empty() {
            log::debug!("Fallback topic '{topic}' produced no passages");
            return Self::empty(trace);
        }
        trace.push(PipelineStage::Assemble);
        trace.finish(assembled.into_response(Some(topic)))
    }

    fn empty(mut trace: Trace) -> ContextResponse {
        trace.push(PipelineStage::EmptyResult);
        trace.finish(ContextResponse::empty())
    }
}

struct Trace {
    enabled: bool,
    stages: Vec<PipelineStage>,
}

impl Trace {
    const fn new(enabled: bool) -> Self {
        Self {
            enabled,
            stages: Vec::new(),
        }
    }

    fn push(&mut self, stage: PipelineStage) {
        if self.enabled {
            self.stages.push(stage);
        }
    }

    fn finish(self, mut response: ContextResponse) -> ContextResponse {
        response.trace = self.stages;
        response
    }
}

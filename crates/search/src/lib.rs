//! # Mark Search
//!
//! Query-time retrieval over the filing index: entity-aware nearest-neighbour selection,
//! token-bounded context assembly, confidence tiers and the fallback topic matcher.
//!
//! ## Request flow
//!
//! ```text
//! query
//!   │
//!   ├──> Retriever (oversampled window, per-entity quotas)
//!   │      └─> ranked candidates
//!   │
//!   ├──> confidence tier sufficient? ──yes──> ContextAssembler ──> ContextResponse
//!   │
//!   └──> TopicMatcher ──activated──> Retriever(topic) ──> ContextAssembler
//!                     └─inapplicable──> empty Insufficient response
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use mark_search::{RetrievalConfig, RetrievalService};
//! use mark_vector_store::{DataLayout, EmbeddingModel};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let layout = DataLayout::for_project_root(std::path::Path::new("."));
//!     let embedder = Arc::new(EmbeddingModel::from_env()?);
//!     let service = RetrievalService::open(&layout, embedder, &RetrievalConfig::default()).await?;
//!
//!     let request = service.request_for(["AAPL", "MSFT"]);
//!     let response = service.answer("How did cloud revenue develop?", &request).await;
//!     println!("{} passages, confidence {}", response.passages.len(), response.confidence);
//!     Ok(())
//! }
//! ```

mod assembler;
mod confidence;
mod config;
mod entity;
mod error;
mod fallback;
mod pipeline;
mod retriever;
mod router;
mod tokens;

pub use assembler::{
    AssembledContext, ContextAssembler, ContextBudget, DEFAULT_MAX_CHUNKS, DEFAULT_TOKEN_BUDGET,
};
pub use confidence::ConfidencePolicy;
pub use config::{
    FallbackSettings, RetrievalConfig, RetrievalSettings, TokenizerKind, TokenizerSettings,
};
pub use entity::{normalize_ticker, EntityFilter};
pub use error::{Result, SearchError};
pub use fallback::{
    default_topics, FallbackDecision, TopicMatch, TopicMatcher, DEFAULT_ACTIVATION_THRESHOLD,
    DEFAULT_TOPICS,
};
pub use pipeline::{token_counter_for, RetrievalService};
pub use retriever::{
    select_candidates, Candidate, QuotaNote, RetrievalRequest, Retriever, DEFAULT_OVERSAMPLE,
    DEFAULT_PER_ENTITY_K, DEFAULT_TOTAL_K,
};
pub use router::{NumericResolver, QuestionClassifier, QuestionRouter};
pub use tokens::{HfTokenCounter, TokenCounter, WordCounter};

use mark_vector_store::{EmbeddingModel, TextEmbedder};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub const DEFAULT_ACTIVATION_THRESHOLD: f32 = 0.5;

/// Market sectors of the covered companies plus general filing subjects.
pub const DEFAULT_TOPICS: &[&str] = &[
    "Technology",
    "Communication Services",
    "Consumer Cyclical",
    "Consumer Defensive",
    "Healthcare",
    "Financial Services",
    "Energy",
    "Industrials",
    "Basic Materials",
    "Real Estate",
    "Utilities",
    "Revenue and earnings",
    "Risk factors",
    "Liquidity and capital resources",
    "Executive compensation",
    "Legal proceedings",
];

#[must_use]
pub fn default_topics() -> Vec<String> {
    DEFAULT_TOPICS.iter().map(|t| (*t).to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicMatch {
    pub topic: String,
    /// Cosine similarity between the query and the topic.
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FallbackDecision {
    Activated(TopicMatch),
    /// No topic clears the threshold; `best` is the closest one when any could be scored.
    Inapplicable { best: Option<TopicMatch> },
}

impl FallbackDecision {
    #[must_use]
    pub const fn is_activated(&self) -> bool {
        matches!(self, Self::Activated(_))
    }
}

/// Maps a poorly served query to the closest general topic.
pub struct TopicMatcher {
    topics: Vec<String>,
    embedder: Arc<dyn TextEmbedder>,
    activation_threshold: f32,
    topic_vectors: OnceCell<Vec<Vec<f32>>>,
}

impl TopicMatcher {
    pub fn new(topics: Vec<String>, embedder: Arc<dyn TextEmbedder>) -> Self {
        let topics = topics
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        Self {
            topics,
            embedder,
            activation_threshold: DEFAULT_ACTIVATION_THRESHOLD,
            topic_vectors: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn with_activation_threshold(mut self, threshold: f32) -> Self {
        self.activation_threshold = threshold;
        self
    }

    #[must_use]
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    #[must_use]
    pub const fn activation_threshold(&self) -> f32 {
        self.activation_threshold
    }

    /// Highest-similarity topic for `query`, or `None` when nothing can be scored.
    pub async fn best_match(&self, query: &str) -> Option<TopicMatch> {
        if self.topics.is_empty() {
            return None;
        }
        let topic_vectors = match self
            .topic_vectors
            .get_or_try_init(|| self.embedder.embed_batch(&self.topics))
            .await
        {
            Ok(vectors) => vectors,
            Err(err) => {
                log::warn!("Topic embedding failed: {err}");
                return None;
            }
        };
        let query_vector = match self.embedder.embed(query).await {
            Ok(vector) => vector,
            Err(err) => {
                log::warn!("Fallback query embedding failed: {err}");
                return None;
            }
        };

        let mut best: Option<TopicMatch> = None;
        for (topic, vector) in self.topics.iter().zip(topic_vectors) {
            let score = EmbeddingModel::cosine_similarity(&query_vector, vector);
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(TopicMatch {
                    topic: topic.clone(),
                    score,
                });
            }
        }
        best
    }

    pub async fn decide(&self, query: &str) -> FallbackDecision {
        match self.best_match(query).await {
            Some(found) if found.score >= self.activation_threshold => {
                log::info!(
                    "Fallback topic '{}' activated (similarity {:.3})",
                    found.topic,
                    found.score
                );
                FallbackDecision::Activated(found)
            }
            best => {
                log::debug!("Fallback inapplicable (best={best:?})");
                FallbackDecision::Inapplicable { best }
            }
        }
    }
}

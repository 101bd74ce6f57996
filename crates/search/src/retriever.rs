use crate::entity::EntityFilter;
use crate::error::{Result, SearchError};
use mark_vector_store::{ChunkRecord, IndexedCorpus, SearchHit, TextEmbedder};
use serde::Serialize;
use std::sync::Arc;

pub const DEFAULT_TOTAL_K: usize = 8;
pub const DEFAULT_PER_ENTITY_K: usize = 2;
pub const DEFAULT_OVERSAMPLE: usize = 50;

/// Which requested entity a filtered candidate was admitted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaNote {
    /// Normalized ticker.
    pub entity: String,
    /// The candidate used one of that entity's `per_entity_k` slots.
    pub counted: bool,
}

/// A ranked chunk with its raw distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub ordinal: usize,
    /// Squared Euclidean distance; lower is closer.
    pub distance: f32,
    pub record: ChunkRecord,
    /// `None` when retrieval was unfiltered.
    pub quota: Option<QuotaNote>,
}

impl Candidate {
    /// Chunk identifier (its file name).
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.record.filename
    }
}

impl From<SearchHit> for Candidate {
    fn from(hit: SearchHit) -> Self {
        Self {
            ordinal: hit.ordinal,
            distance: hit.distance,
            record: hit.record,
            quota: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    pub tickers: Vec<String>,
    pub total_k: usize,
    pub per_entity_k: usize,
}

impl Default for RetrievalRequest {
    fn default() -> Self {
        Self {
            tickers: Vec::new(),
            total_k: DEFAULT_TOTAL_K,
            per_entity_k: DEFAULT_PER_ENTITY_K,
        }
    }
}

impl RetrievalRequest {
    #[must_use]
    pub fn for_tickers<S: Into<String>>(tickers: impl IntoIterator<Item = S>) -> Self {
        Self {
            tickers: tickers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_total_k(mut self, total_k: usize) -> Self {
        self.total_k = total_k;
        self
    }

    #[must_use]
    pub fn with_per_entity_k(mut self, per_entity_k: usize) -> Self {
        self.per_entity_k = per_entity_k;
        self
    }
}

/// Nearest-neighbour retrieval with optional per-entity quotas.
pub struct Retriever {
    corpus: Arc<IndexedCorpus>,
    embedder: Arc<dyn TextEmbedder>,
    oversample: usize,
}

impl Retriever {
    pub fn new(corpus: Arc<IndexedCorpus>, embedder: Arc<dyn TextEmbedder>) -> Self {
        Self {
            corpus,
            embedder,
            oversample: DEFAULT_OVERSAMPLE,
        }
    }

    #[must_use]
    pub fn with_oversample(mut self, oversample: usize) -> Self {
        self.oversample = oversample;
        self
    }

    #[must_use]
    pub fn corpus(&self) -> &IndexedCorpus {
        &self.corpus
    }

    #[must_use]
    pub fn embedder(&self) -> &Arc<dyn TextEmbedder> {
        &self.embedder
    }

    /// Embeds `query` and selects candidates. Embedding failures are returned to the caller.
    pub async fn retrieve(&self, query: &str, request: &RetrievalRequest) -> Result<Vec<Candidate>> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if request.total_k == 0 || self.corpus.is_empty() {
            return Ok(vec![]);
        }
        let vector = self.embedder.embed(query).await?;
        self.retrieve_vector(&vector, request)
    }

    /// Selection over an already-embedded query.
    pub fn retrieve_vector(
        &self,
        vector: &[f32],
        request: &RetrievalRequest,
    ) -> Result<Vec<Candidate>> {
        if request.total_k == 0 {
            return Ok(vec![]);
        }
        let window = self.oversample.max(request.total_k);
        let hits = self.corpus.search(vector, window)?;
        let candidates = select_candidates(hits, request);
        log::debug!(
            "Retrieved {} candidates (window={window}, tickers={:?})",
            candidates.len(),
            request.tickers
        );
        Ok(candidates)
    }
}

/// Applies the entity quotas to hits already sorted by ascending distance.
///
/// Without a usable ticker the first `total_k` hits are returned. With tickers, hits are
/// accepted in distance order while their entity is below `per_entity_k`, until `total_k`
/// candidates are accepted or every quota is full.
#[must_use]
pub fn select_candidates(hits: Vec<SearchHit>, request: &RetrievalRequest) -> Vec<Candidate> {
    if request.total_k == 0 {
        return vec![];
    }
    let filter = EntityFilter::new(&request.tickers);
    if filter.is_empty() {
        return hits
            .into_iter()
            .take(request.total_k)
            .map(Candidate::from)
            .collect();
    }
    if request.per_entity_k == 0 {
        return vec![];
    }

    let mut counts = vec![0usize; filter.len()];
    let mut full = 0usize;
    let mut selected = Vec::new();
    for hit in hits {
        if selected.len() >= request.total_k || full == filter.len() {
            break;
        }
        let Some(slot) = filter.slot_for(hit.identifier()) else {
            continue;
        };
        if counts[slot] >= request.per_entity_k {
            continue;
        }
        counts[slot] += 1;
        if counts[slot] == request.per_entity_k {
            full += 1;
        }
        selected.push(Candidate {
            quota: Some(QuotaNote {
                entity: filter.tickers()[slot].clone(),
                counted: true,
            }),
            ..Candidate::from(hit)
        });
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use mark_vector_store::ChunkRecord;
    use pretty_assertions::assert_eq;

    fn hit(ordinal: usize, name: &str, distance: f32) -> SearchHit {
        SearchHit {
            ordinal,
            distance,
            record: ChunkRecord::new(name, "text"),
        }
    }

    fn names(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(Candidate::identifier).collect()
    }

    #[test]
    fn unfiltered_takes_first_total_k() {
        let hits = vec![
            hit(0, "A_x_chunk1.txt", 0.1),
            hit(1, "B_x_chunk1.txt", 0.2),
            hit(2, "C_x_chunk1.txt", 0.3),
        ];
        let request = RetrievalRequest::default().with_total_k(2);
        let selected = select_candidates(hits, &request);
        assert_eq!(names(&selected), vec!["A_x_chunk1.txt", "B_x_chunk1.txt"]);
        assert!(selected.iter().all(|c| c.quota.is_none()));
    }

    #[test]
    fn quotas_cap_each_entity() {
        let hits = vec![
            hit(0, "AAA_10-K_1_chunk1.txt", 0.1),
            hit(1, "AAA_10-K_1_chunk2.txt", 0.2),
            hit(2, "AAA_10-K_1_chunk3.txt", 0.3),
            hit(3, "CCC_10-K_1_chunk1.txt", 0.35),
            hit(4, "BBB_10-K_1_chunk1.txt", 0.4),
            hit(5, "BBB_10-K_1_chunk2.txt", 0.5),
            hit(6, "BBB_10-K_1_chunk3.txt", 0.6),
        ];
        let request = RetrievalRequest::for_tickers(["aaa", "BBB"]).with_total_k(4);
        let selected = select_candidates(hits, &request);
        assert_eq!(
            names(&selected),
            vec![
                "AAA_10-K_1_chunk1.txt",
                "AAA_10-K_1_chunk2.txt",
                "BBB_10-K_1_chunk1.txt",
                "BBB_10-K_1_chunk2.txt",
            ]
        );
        let entities: Vec<&str> = selected
            .iter()
            .map(|c| c.quota.as_ref().map_or("", |q| q.entity.as_str()))
            .collect();
        assert_eq!(entities, vec!["AAA", "AAA", "BBB", "BBB"]);
        assert!(selected.iter().all(|c| c.quota.as_ref().is_some_and(|q| q.counted)));
        assert_eq!(selected[2].ordinal, 4);
        assert_eq!(selected[2].record.path, "data/chunks/BBB_10-K_1_chunk1.txt");
    }

    #[test]
    fn closer_entity_wins_contested_slots() {
        let hits = vec![
            hit(0, "AAA_1_chunk1.txt", 0.1),
            hit(1, "AAA_1_chunk2.txt", 0.2),
            hit(2, "BBB_1_chunk1.txt", 0.3),
        ];
        let request = RetrievalRequest::for_tickers(["AAA", "BBB"])
            .with_total_k(2)
            .with_per_entity_k(2);
        assert_eq!(
            names(&select_candidates(hits, &request)),
            vec!["AAA_1_chunk1.txt", "AAA_1_chunk2.txt"]
        );
    }

    #[test]
    fn substring_tickers_do_not_match() {
        let hits = vec![hit(0, "AAPL_1_chunk1.txt", 0.1), hit(1, "A_1_chunk1.txt", 0.2)];
        let request = RetrievalRequest::for_tickers(["A"]);
        assert_eq!(names(&select_candidates(hits, &request)), vec!["A_1_chunk1.txt"]);
    }

    #[test]
    fn zero_budgets_return_nothing() {
        let hits = vec![hit(0, "AAA_1_chunk1.txt", 0.1)];
        assert!(select_candidates(hits.clone(), &RetrievalRequest::default().with_total_k(0)).is_empty());
        let request = RetrievalRequest::for_tickers(["AAA"]).with_per_entity_k(0);
        assert!(select_candidates(hits, &request).is_empty());
    }
}

use crate::confidence::ConfidencePolicy;
use crate::retriever::Candidate;
use crate::tokens::TokenCounter;
use mark_protocol::{BudgetTruncation, ConfidenceTier, ContextResponse, Passage};
use mark_vector_store::ChunkStore;
use std::sync::Arc;

pub const DEFAULT_TOKEN_BUDGET: usize = 2000;
pub const DEFAULT_MAX_CHUNKS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBudget {
    pub token_budget: usize,
    pub max_chunks: usize,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            token_budget: DEFAULT_TOKEN_BUDGET,
            max_chunks: DEFAULT_MAX_CHUNKS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub passages: Vec<Passage>,
    pub used_tokens: usize,
    pub truncation: Option<BudgetTruncation>,
    /// Candidates dropped because their chunk was missing, unreadable, blank or uncountable.
    pub skipped: usize,
    pub confidence: ConfidenceTier,
}

impl AssembledContext {
    #[must_use]
    pub fn source_identifiers(&self) -> Vec<String> {
        self.passages.iter().map(|p| p.identifier.clone()).collect()
    }

    #[must_use]
    pub fn into_response(self, fallback_topic: Option<String>) -> ContextResponse {
        ContextResponse {
            source_identifiers: self.source_identifiers(),
            passages: self.passages,
            confidence: self.confidence,
            fallback_used: fallback_topic.is_some(),
            fallback_topic,
            used_tokens: self.used_tokens,
            truncation: self.truncation,
            trace: Vec::new(),
        }
    }
}

/// Turns ranked candidates into a token-bounded list of passages.
pub struct ContextAssembler {
    store: ChunkStore,
    counter: Arc<dyn TokenCounter>,
    budget: ContextBudget,
    policy: ConfidencePolicy,
}

impl ContextAssembler {
    pub fn new(
        store: ChunkStore,
        counter: Arc<dyn TokenCounter>,
        budget: ContextBudget,
        policy: ConfidencePolicy,
    ) -> Self {
        Self {
            store,
            counter,
            budget,
            policy,
        }
    }

    #[must_use]
    pub const fn budget(&self) -> ContextBudget {
        self.budget
    }

    #[must_use]
    pub const fn policy(&self) -> &ConfidencePolicy {
        &self.policy
    }

    #[must_use]
    pub fn token_strategy(&self) -> &str {
        self.counter.strategy()
    }

    /// Takes candidates in rank order as a strict prefix of the budget.
    ///
    /// Confidence comes from the best distance over all `candidates`, including ones that were
    /// skipped or did not fit.
    pub async fn assemble(&self, candidates: &[Candidate]) -> AssembledContext {
        let confidence = self
            .policy
            .tier_for_best(candidates.iter().map(|c| c.distance));

        let mut passages: Vec<Passage> = Vec::new();
        let mut used_tokens = 0usize;
        let mut truncation = None;
        let mut skipped = 0usize;

        for candidate in candidates {
            if passages.len() >= self.budget.max_chunks {
                truncation = Some(BudgetTruncation::MaxChunks);
                break;
            }
            let text = match self.store.read(candidate.identifier()).await {
                Ok(Some(text)) => text,
                Ok(None) => {
                    log::warn!("Chunk {} not found; skipping", candidate.identifier());
                    skipped += 1;
                    continue;
                }
                Err(err) => {
                    log::warn!("Chunk {} unreadable: {err}; skipping", candidate.identifier());
                    skipped += 1;
                    continue;
                }
            };
            let text = text.trim();
            if text.is_empty() {
                skipped += 1;
                continue;
            }

            let tokens = match self.counter.count_tokens(text) {
                Ok(tokens) => tokens,
                Err(err) => {
                    log::warn!("Chunk {} not countable: {err}; skipping", candidate.identifier());
                    skipped += 1;
                    continue;
                }
            };
            if used_tokens + tokens > self.budget.token_budget {
                truncation = Some(BudgetTruncation::MaxTokens);
                break;
            }
            used_tokens += tokens;
            passages.push(Passage {
                identifier: candidate.identifier().to_string(),
                text: text.to_string(),
            });
        }

        log::debug!(
            "Assembled {} passages ({used_tokens} tokens, confidence={confidence}, truncation={truncation:?})",
            passages.len()
        );
        AssembledContext {
            passages,
            used_tokens,
            truncation,
            skipped,
            confidence,
        }
    }
}

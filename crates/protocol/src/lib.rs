use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod routing;

pub use routing::{AnswerPayload, NumericalAnswer, QuestionKind};

/// Coarse retrieval quality derived from the best (lowest) candidate distance.
///
/// Variants are declared best-first, so `Ord` ranks `High < Moderate < Low < Insufficient`:
/// a "smaller" tier is a better one.
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    High,
    Moderate,
    Low,
    Insufficient,
}

impl ConfidenceTier {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Low => "low",
            Self::Insufficient => "insufficient",
        }
    }

    /// True when `self` is at least as good as `floor`.
    #[must_use]
    pub fn meets(self, floor: Self) -> bool {
        self <= floor
    }
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BudgetTruncation {
    MaxTokens,
    MaxChunks,
}

/// Stages of a single context request. Terminal stages are `Assemble` and `EmptyResult`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    QueryReceived,
    PrimaryRetrieval,
    FallbackLookup,
    RetryRetrievalOnTopic,
    Assemble,
    EmptyResult,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct Passage {
    pub identifier: String,
    pub text: String,
}

/// What the retrieval core hands to the answer composer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct ContextResponse {
    pub passages: Vec<Passage>,
    pub source_identifiers: Vec<String>,
    pub confidence: ConfidenceTier,
    /// Set whenever the passages answer a substituted topic instead of the question itself.
    pub fallback_used: bool,
    pub fallback_topic: Option<String>,
    #[serde(default)]
    pub used_tokens: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation: Option<BudgetTruncation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<PipelineStage>,
}

impl ContextResponse {
    /// The "no relevant content" envelope.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            passages: Vec::new(),
            source_identifiers: Vec::new(),
            confidence: ConfidenceTier::Insufficient,
            fallback_used: false,
            fallback_topic: None,
            used_tokens: 0,
            truncation: None,
            trace: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

impl Default for ContextResponse {
    fn default() -> Self {
        Self::empty()
    }
}

pub fn response_schema() -> Result<String> {
    let schema = schemars::schema_for!(ContextResponse);
    serde_json::to_string_pretty(&schema).map_err(Into::into)
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tiers_order_best_first() {
        assert!(ConfidenceTier::High < ConfidenceTier::Moderate);
        assert!(ConfidenceTier::Moderate < ConfidenceTier::Low);
        assert!(ConfidenceTier::Low < ConfidenceTier::Insufficient);
        assert!(ConfidenceTier::High.meets(ConfidenceTier::Moderate));
        assert!(!ConfidenceTier::Low.meets(ConfidenceTier::Moderate));
    }

    #[test]
    fn empty_response_serializes_contract_fields() {
        let json = serde_json::to_value(ContextResponse::empty()).unwrap();
        assert_eq!(json["passages"], serde_json::json!([]));
        assert_eq!(json["source_identifiers"], serde_json::json!([]));
        assert_eq!(json["confidence"], "insufficient");
        assert_eq!(json["fallback_used"], false);
        assert!(json["fallback_topic"].is_null());
        assert!(json.get("trace").is_none());
    }

    #[test]
    fn schema_mentions_envelope_fields() {
        let schema = response_schema().unwrap();
        for field in ["passages", "source_identifiers", "confidence", "fallback_used"] {
            assert!(schema.contains(field), "schema misses {field}");
        }
    }
}

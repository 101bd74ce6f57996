use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use mark_protocol::ConfidenceTier;
use serde::Deserialize;

use crate::assembler::{ContextBudget, DEFAULT_MAX_CHUNKS, DEFAULT_TOKEN_BUDGET};
use crate::confidence::ConfidencePolicy;
use crate::fallback::{default_topics, DEFAULT_ACTIVATION_THRESHOLD};
use crate::retriever::{DEFAULT_OVERSAMPLE, DEFAULT_PER_ENTITY_K, DEFAULT_TOTAL_K};

/// Retrieval service settings. Every field has a default; files override selectively.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrievalConfig {
    pub retrieval: RetrievalSettings,
    pub context: ContextBudget,
    pub confidence: ConfidencePolicy,
    pub fallback: FallbackSettings,
    pub tokenizer: TokenizerSettings,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetrievalSettings {
    pub total_k: usize,
    pub per_entity_k: usize,
    pub oversample: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            total_k: DEFAULT_TOTAL_K,
            per_entity_k: DEFAULT_PER_ENTITY_K,
            oversample: DEFAULT_OVERSAMPLE,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FallbackSettings {
    pub enabled: bool,
    pub activation_threshold: f32,
    pub topics: Vec<String>,
    /// Lowest primary tier that is served without a fallback lookup.
    pub sufficient_tier: ConfidenceTier,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            activation_threshold: DEFAULT_ACTIVATION_THRESHOLD,
            topics: default_topics(),
            sufficient_tier: ConfidenceTier::Moderate,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerKind {
    #[default]
    Words,
    #[serde(alias = "hf")]
    Huggingface,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenizerSettings {
    pub kind: TokenizerKind,
    pub path: Option<PathBuf>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalSettings::default(),
            context: ContextBudget::default(),
            confidence: ConfidencePolicy::default(),
            fallback: FallbackSettings::default(),
            tokenizer: TokenizerSettings::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    schema_version: Option<u32>,
    #[serde(default)]
    retrieval: Option<RawRetrieval>,
    #[serde(default)]
    context: Option<RawContext>,
    #[serde(default)]
    confidence: Option<RawConfidence>,
    #[serde(default)]
    fallback: Option<RawFallback>,
    #[serde(default)]
    tokenizer: Option<RawTokenizer>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawRetrieval {
    total_k: Option<usize>,
    per_entity_k: Option<usize>,
    oversample: Option<usize>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawContext {
    token_budget: Option<usize>,
    max_chunks: Option<usize>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawConfidence {
    high_below: Option<f32>,
    moderate_below: Option<f32>,
    low_below: Option<f32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawFallback {
    enabled: Option<bool>,
    activation_threshold: Option<f32>,
    topics: Option<Vec<String>>,
    sufficient_tier: Option<ConfidenceTier>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawTokenizer {
    kind: Option<TokenizerKind>,
    path: Option<PathBuf>,
}

const SECTION_KEYS: &[(&str, &[&str])] = &[
    ("retrieval", &["total_k", "per_entity_k", "oversample"]),
    ("context", &["token_budget", "max_chunks"]),
    ("confidence", &["high_below", "moderate_below", "low_below"]),
    (
        "fallback",
        &["enabled", "activation_threshold", "topics", "sufficient_tier"],
    ),
    ("tokenizer", &["kind", "path"]),
];

impl RetrievalConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_bytes(&bytes)
            .with_context(|| format!("Invalid retrieval config {}", path.display()))
    }

    /// Parses JSON, or TOML when the bytes are not JSON.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw = parse_raw(bytes)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        if let Some(schema_version) = raw.schema_version {
            if schema_version != 1 {
                return Err(anyhow!(
                    "config.schema_version {schema_version} is not supported (expected 1)"
                ));
            }
        }
        let defaults = Self::default();

        let retrieval = raw.retrieval.unwrap_or_default();
        let retrieval = RetrievalSettings {
            total_k: retrieval.total_k.unwrap_or(defaults.retrieval.total_k),
            per_entity_k: retrieval
                .per_entity_k
                .unwrap_or(defaults.retrieval.per_entity_k),
            oversample: retrieval.oversample.unwrap_or(defaults.retrieval.oversample),
        };

        let context = raw.context.unwrap_or_default();
        let context = ContextBudget {
            token_budget: context.token_budget.unwrap_or(DEFAULT_TOKEN_BUDGET),
            max_chunks: context.max_chunks.unwrap_or(DEFAULT_MAX_CHUNKS),
        };

        let confidence = raw.confidence.unwrap_or_default();
        let confidence = ConfidencePolicy::new(
            confidence
                .high_below
                .unwrap_or(defaults.confidence.high_below()),
            confidence
                .moderate_below
                .unwrap_or(defaults.confidence.moderate_below()),
            confidence
                .low_below
                .unwrap_or(defaults.confidence.low_below()),
        )
        .map_err(|err| anyhow!("confidence: {err}"))?;

        let fallback = raw.fallback.unwrap_or_default();
        let fallback = FallbackSettings {
            enabled: fallback.enabled.unwrap_or(defaults.fallback.enabled),
            activation_threshold: fallback
                .activation_threshold
                .unwrap_or(defaults.fallback.activation_threshold),
            topics: fallback.topics.unwrap_or(defaults.fallback.topics),
            sufficient_tier: fallback
                .sufficient_tier
                .unwrap_or(defaults.fallback.sufficient_tier),
        };

        let tokenizer = raw.tokenizer.unwrap_or_default();
        let tokenizer = TokenizerSettings {
            kind: tokenizer.kind.unwrap_or_default(),
            path: tokenizer.path,
        };

        let cfg = Self {
            retrieval,
            context,
            confidence,
            fallback,
            tokenizer,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retrieval.per_entity_k == 0 {
            return Err(anyhow!("retrieval.per_entity_k must be > 0"));
        }
        if self.context.max_chunks == 0 {
            return Err(anyhow!("context.max_chunks must be > 0"));
        }
        if self.context.token_budget == 0 {
            return Err(anyhow!("context.token_budget must be > 0"));
        }
        let threshold = self.fallback.activation_threshold;
        if !threshold.is_finite() || !(-1.0..=1.0).contains(&threshold) {
            return Err(anyhow!(
                "fallback.activation_threshold must be within [-1, 1] (got {threshold})"
            ));
        }
        if self.fallback.enabled && self.fallback.topics.iter().all(|t| t.trim().is_empty()) {
            return Err(anyhow!("fallback.topics must not be empty when fallback is enabled"));
        }
        if self.tokenizer.kind == TokenizerKind::Huggingface && self.tokenizer.path.is_none() {
            return Err(anyhow!("tokenizer.path is required for kind = \"huggingface\""));
        }
        Ok(())
    }
}

fn parse_raw(bytes: &[u8]) -> Result<RawConfig> {
    let value: serde_json::Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(json_err) => {
            let utf8 = std::str::from_utf8(bytes).map_err(|err| anyhow!("{json_err}; {err}"))?;
            let toml_value: toml::Value = toml::from_str(utf8).map_err(|toml_err| {
                anyhow!("Config is not valid JSON or TOML ({json_err}); TOML parse error: {toml_err}")
            })?;
            serde_json::to_value(toml_value)
                .map_err(|err| anyhow!("Failed to convert TOML config to JSON: {err}"))?
        }
    };

    validate_config_value(&value)?;
    serde_json::from_value(value).map_err(|err| anyhow!("Config parse error: {err}"))
}

fn validate_config_value(value: &serde_json::Value) -> Result<()> {
    let Some(root) = value.as_object() else {
        return Err(anyhow!("Config root must be an object"));
    };

    let mut unknown = Vec::new();
    for (key, section) in root {
        if key == "schema_version" {
            continue;
        }
        let Some((_, allowed)) = SECTION_KEYS.iter().find(|(name, _)| name == key) else {
            unknown.push(key.clone());
            continue;
        };
        let Some(fields) = section.as_object() else {
            return Err(anyhow!("config.{key} must be an object"));
        };
        for field in fields.keys() {
            if !allowed.contains(&field.as_str()) {
                unknown.push(format!("{key}.{field}"));
            }
        }
    }

    if unknown.is_empty() {
        Ok(())
    } else {
        unknown.sort();
        Err(anyhow!("Unknown config keys: {}", unknown.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_is_all_defaults() {
        let cfg = RetrievalConfig::from_bytes(b"{}").unwrap();
        assert_eq!(cfg, RetrievalConfig::default());
        assert_eq!(cfg.retrieval.total_k, 8);
        assert_eq!(cfg.context.token_budget, 2000);
        assert_eq!(cfg.fallback.sufficient_tier, ConfidenceTier::Moderate);
    }

    #[test]
    fn toml_overrides_merge_over_defaults() {
        let bytes = br#"
[retrieval]
total_k = 4

[fallback]
topics = ["Energy"]
sufficient_tier = "high"

[tokenizer]
kind = "huggingface"
path = "models/tokenizer.json"
"#;
        let cfg = RetrievalConfig::from_bytes(bytes).unwrap();
        assert_eq!(cfg.retrieval.total_k, 4);
        assert_eq!(cfg.retrieval.per_entity_k, 2);
        assert_eq!(cfg.fallback.topics, vec!["Energy".to_string()]);
        assert_eq!(cfg.fallback.sufficient_tier, ConfidenceTier::High);
        assert_eq!(cfg.tokenizer.kind, TokenizerKind::Huggingface);
    }

    #[test]
    fn rejects_unknown_keys_with_paths() {
        let bytes = br#"{ "retrieval": { "top_k": 3 }, "rerank": {} }"#;
        let msg = format!("{:#}", RetrievalConfig::from_bytes(bytes).unwrap_err());
        assert!(msg.contains("retrieval.top_k"), "{msg}");
        assert!(msg.contains("rerank"), "{msg}");
    }

    #[test]
    fn rejects_invalid_values() {
        let unordered = br#"{ "confidence": { "high_below": 1.3 } }"#;
        assert!(RetrievalConfig::from_bytes(unordered).is_err());

        let no_chunks = br#"{ "context": { "max_chunks": 0 } }"#;
        assert!(RetrievalConfig::from_bytes(no_chunks).is_err());

        let hf_without_path = br#"{ "tokenizer": { "kind": "huggingface" } }"#;
        assert!(RetrievalConfig::from_bytes(hf_without_path).is_err());

        let version = br#"{ "schema_version": 7 }"#;
        assert!(RetrievalConfig::from_bytes(version).is_err());
    }
}

use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const DEFAULT_MODEL_ID: &str = "text-embedding-3-small";
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_STUB_DIMENSION: usize = 384;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Text → fixed-dimension vector service.
///
/// Implementations must fail loudly: a batch either yields one vector of [`dimension`] per
/// input text or an error. Nothing in this workspace substitutes empty vectors.
///
/// [`dimension`]: TextEmbedder::dimension
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| VectorStoreError::EmbeddingError("Empty embedding result".to_string()))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMode {
    Remote,
    Stub,
}

impl EmbeddingMode {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "remote" | "openai" => Ok(Self::Remote),
            "stub" => Ok(Self::Stub),
            other => Err(VectorStoreError::EmbeddingError(format!(
                "Unsupported MARK_EMBEDDING_MODE '{other}' (expected 'remote' or 'stub')"
            ))),
        }
    }

    fn from_env() -> Result<Self> {
        env::var("MARK_EMBEDDING_MODE").map_or(Ok(Self::Remote), |raw| Self::parse(&raw))
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Stub => "stub",
        }
    }
}

#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    pub mode: EmbeddingMode,
    pub model_id: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub dimension: Option<usize>,
    pub timeout: Duration,
}

impl EmbeddingConfig {
    /// Reads `MARK_EMBEDDING_MODE`, `EMBEDDING_MODEL`, `OPENAI_API_KEY`,
    /// `MARK_EMBEDDING_ENDPOINT` and `MARK_EMBEDDING_DIM`.
    pub fn from_env() -> Result<Self> {
        let dimension = match env::var("MARK_EMBEDDING_DIM") {
            Ok(raw) => Some(raw.trim().parse::<usize>().map_err(|err| {
                VectorStoreError::EmbeddingError(format!("Invalid MARK_EMBEDDING_DIM '{raw}': {err}"))
            })?),
            Err(_) => None,
        };
        Ok(Self {
            mode: EmbeddingMode::from_env()?,
            model_id: env::var("EMBEDDING_MODEL").unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string()),
            endpoint: env::var("MARK_EMBEDDING_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            dimension,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    #[must_use]
    pub fn stub(dimension: usize) -> Self {
        Self {
            mode: EmbeddingMode::Stub,
            model_id: format!("stub-{dimension}"),
            endpoint: String::new(),
            api_key: None,
            dimension: Some(dimension),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: EmbeddingMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    fn resolved_dimension(&self) -> Result<usize> {
        if let Some(dim) = self.dimension {
            if dim == 0 {
                return Err(VectorStoreError::EmbeddingError(
                    "Embedding dimension must be > 0".to_string(),
                ));
            }
            return Ok(dim);
        }
        match self.mode {
            EmbeddingMode::Stub => Ok(DEFAULT_STUB_DIMENSION),
            EmbeddingMode::Remote => known_dimension(&self.model_id).ok_or_else(|| {
                VectorStoreError::EmbeddingError(format!(
                    "Unknown dimension for embedding model '{}'; set MARK_EMBEDDING_DIM",
                    self.model_id
                ))
            }),
        }
    }
}

fn known_dimension(model_id: &str) -> Option<usize> {
    match model_id.trim().to_ascii_lowercase().as_str() {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        "nomic-embed-text" => Some(768),
        "all-minilm" | "all-minilm-l6-v2" => Some(384),
        _ => None,
    }
}

/// Embedding model backed by an OpenAI-compatible HTTP endpoint or by a deterministic stub.
pub struct EmbeddingModel {
    model_id: String,
    dimension: usize,
    backend: EmbeddingBackend,
}

enum EmbeddingBackend {
    Remote(RemoteBackend),
    Stub(StubBackend),
}

impl EmbeddingModel {
    pub fn from_env() -> Result<Self> {
        Self::new(EmbeddingConfig::from_env()?)
    }

    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let dimension = config.resolved_dimension()?;
        let backend = match config.mode {
            EmbeddingMode::Stub => EmbeddingBackend::Stub(StubBackend { dimension }),
            EmbeddingMode::Remote => {
                let api_key = config.api_key.clone().ok_or_else(|| {
                    VectorStoreError::EmbeddingError("OPENAI_API_KEY is not set".to_string())
                })?;
                let client = reqwest::Client::builder().timeout(config.timeout).build()?;
                EmbeddingBackend::Remote(RemoteBackend {
                    client,
                    endpoint: config.endpoint.trim_end_matches('/').to_string(),
                    api_key,
                })
            }
        };
        log::debug!(
            "Embedding model '{}' ({}, dim={dimension})",
            config.model_id,
            config.mode.as_str()
        );
        Ok(Self {
            model_id: config.model_id,
            dimension,
            backend,
        })
    }

    #[must_use]
    pub fn stub(dimension: usize) -> Self {
        Self {
            model_id: format!("stub-{dimension}"),
            dimension,
            backend: EmbeddingBackend::Stub(StubBackend { dimension }),
        }
    }

    #[must_use]
    pub const fn mode(&self) -> EmbeddingMode {
        match self.backend {
            EmbeddingBackend::Remote(_) => EmbeddingMode::Remote,
            EmbeddingBackend::Stub(_) => EmbeddingMode::Stub,
        }
    }

    #[must_use]
    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }
}

#[async_trait]
impl TextEmbedder for EmbeddingModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let vectors = match &self.backend {
            EmbeddingBackend::Stub(stub) => stub.embed_batch(texts),
            EmbeddingBackend::Remote(remote) => remote.embed_batch(&self.model_id, texts).await?,
        };
        check_batch(texts.len(), &vectors, self.dimension)?;
        Ok(vectors)
    }
}

/// Reject short, empty or mis-sized responses instead of letting them reach the index.
pub fn check_batch(expected_len: usize, vectors: &[Vec<f32>], dimension: usize) -> Result<()> {
    if vectors.len() != expected_len {
        return Err(VectorStoreError::EmbeddingError(format!(
            "Embedding service returned {} vectors for {expected_len} texts",
            vectors.len()
        )));
    }
    for vector in vectors {
        if vector.is_empty() {
            return Err(VectorStoreError::EmbeddingError(
                "Embedding service returned an empty vector".to_string(),
            ));
        }
        if vector.len() != dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: dimension,
                actual: vector.len(),
            });
        }
    }
    Ok(())
}

struct RemoteBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl RemoteBackend {
    async fn embed_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest { model, input: texts })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::EmbeddingError(format!(
                "Embedding API error {status}: {body}"
            )));
        }

        let mut parsed: EmbeddingResponse = response.json().await?;
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[derive(Clone)]
struct StubBackend {
    dimension: usize,
}

impl StubBackend {
    fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts
            .iter()
            .map(|text| stub_embed(text, self.dimension))
            .collect()
    }
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

/// Deterministic unit vector for `text`: equal texts map to equal vectors.
fn stub_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut state =
        fnv1a_64(text.as_bytes()) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut vec = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        let bits = splitmix64(&mut state);
        let high = (bits >> 32) as u32;
        let mantissa = high >> 9;
        let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
        vec.push(unit.mul_add(2.0, -1.0));
    }
    normalize(&mut vec);
    vec
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

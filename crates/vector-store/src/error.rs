use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorStoreError>;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Index error: {0}")]
    IndexError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Index artifact missing: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("Index artifacts disagree: {vectors} vectors but {metadata} metadata rows")]
    CardinalityMismatch { vectors: usize, metadata: usize },

    #[error("Corrupt index file {}: {reason}", path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("{0}")]
    Other(String),
}

impl VectorStoreError {
    /// Errors that mean the persisted index cannot be served at all.
    #[must_use]
    pub const fn is_fatal_artifact_error(&self) -> bool {
        matches!(
            self,
            Self::MissingArtifact(_) | Self::CardinalityMismatch { .. } | Self::CorruptIndex { .. }
        )
    }
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Chunker error: {0}")]
    ChunkerError(#[from] mark_chunker::ChunkerError),

    #[error("Vector store error: {0}")]
    VectorStoreError(#[from] mark_vector_store::VectorStoreError),

    #[error("Invalid build configuration: {0}")]
    InvalidConfig(String),

    #[error("Embedding failed for batch starting at {first}: {source}")]
    EmbedFailed {
        first: String,
        #[source]
        source: mark_vector_store::VectorStoreError,
    },

    #[error("{0}")]
    Other(String),
}

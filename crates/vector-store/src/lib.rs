//! # Mark Vector Store
//!
//! Embedding index over filing chunks: a flat squared-L2 vector index, the row-aligned chunk
//! metadata, the chunk file store and the text embedding seam.
//!
//! ## Architecture
//!
//! ```text
//! data/chunks/*.txt
//!     │
//!     ├──> TextEmbedder (remote OpenAI-compatible API or deterministic stub)
//!     │      └─> Vec<f32>[dim]
//!     │
//!     └──> IndexedCorpus
//!            ├─> FlatL2Index    → data/index/company_index.vec
//!            └─> MetadataTable  → data/index/metadata.json
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use mark_vector_store::{DataLayout, EmbeddingModel, IndexedCorpus, TextEmbedder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let layout = DataLayout::for_project_root(std::path::Path::new("."));
//!     let corpus = IndexedCorpus::load(&layout).await?;
//!     let embedder = EmbeddingModel::from_env()?;
//!
//!     let query = embedder.embed("Apple services revenue").await?;
//!     for hit in corpus.search(&query, 5)? {
//!         println!("{} {:.3}", hit.identifier(), hit.distance);
//!     }
//!     Ok(())
//! }
//! ```

mod chunk_store;
mod embeddings;
mod error;
mod flat_index;
mod metadata;
mod paths;
mod store;
mod types;

pub use chunk_store::ChunkStore;
pub use embeddings::{
    check_batch, EmbeddingConfig, EmbeddingMode, EmbeddingModel, TextEmbedder, DEFAULT_ENDPOINT,
    DEFAULT_MODEL_ID,
};
pub use error::{Result, VectorStoreError};
pub use flat_index::FlatL2Index;
pub use metadata::{ChunkRecord, MetadataTable, METADATA_SCHEMA_VERSION};
pub use paths::DataLayout;
pub use store::IndexedCorpus;
pub use types::SearchHit;

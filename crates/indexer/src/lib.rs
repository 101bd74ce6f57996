//! # Mark Indexer
//!
//! Offline build job for the filing embedding index.
//!
//! ## Pipeline
//!
//! ```text
//! data/chunks/*.txt
//!     │
//!     ├──> ChunkScanner (sorted, skips chunks already indexed)
//!     │
//!     ├──> TextEmbedder (batch_size per request)
//!     │
//!     └──> IndexedCorpus::append
//!            └─> checkpoint every save_every chunks, final persist
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use mark_indexer::{BuildConfig, CorpusIndexer};
//! use mark_vector_store::{DataLayout, EmbeddingModel};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let layout = DataLayout::for_project_root(std::path::Path::new("."));
//!     let embedder = Arc::new(EmbeddingModel::from_env()?);
//!     let indexer = CorpusIndexer::new(layout, embedder, BuildConfig::from_env()?)?;
//!     let stats = indexer.index().await?;
//!
//!     println!("Indexed {} chunks, {} total", stats.indexed, stats.total_entries);
//!     Ok(())
//! }
//! ```

mod error;
mod index_lock;
mod indexer;
mod scanner;
mod stats;

pub use error::{IndexerError, Result};
pub use indexer::{
    BuildConfig, BuildProgress, CorpusIndexer, EmbedFailurePolicy, ProgressCallback,
    DEFAULT_BATCH_SIZE, DEFAULT_SAVE_EVERY,
};
pub use scanner::ChunkScanner;
pub use stats::BuildStats;

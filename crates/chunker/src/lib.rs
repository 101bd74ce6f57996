//! # Mark Chunker
//!
//! Filing text extraction and paragraph-aware chunking into independently addressable chunk
//! files.
//!
//! ## Pipeline
//!
//! ```text
//! data/documents_raw/AAPL_10-K_0000320193-23-000106.html
//!     │
//!     ├──> Drop scripts, tables and inline XBRL; keep text from the FORM banner on
//!     │
//! data/text_clean/AAPL_10-K_0000320193-23-000106.txt
//!     │
//!     ├──> Split on blank lines → paragraphs
//!     │
//!     ├──> Greedy packing (≤ max_chars per chunk)
//!     │      └─> oversize paragraphs are word-wrapped on their own
//!     │
//!     └──> data/chunks/AAPL_10-K_0000320193-23-000106_chunk{N}.txt
//! ```
//!
//! The chunk file name is the chunk's stable identifier; its first `_`-separated segment is the
//! owning ticker (see [`ChunkId`]).
//!
//! ## Example
//!
//! ```rust
//! use mark_chunker::{ChunkerConfig, ParagraphChunker};
//!
//! let chunker = ParagraphChunker::new(ChunkerConfig::default()).unwrap();
//! let chunks = chunker.chunk("Revenue grew.\n\nMargins held steady.");
//! assert_eq!(chunks, vec!["Revenue grew.\n\nMargins held steady.".to_string()]);
//! ```

mod chunker;
mod config;
mod error;
mod extract;
mod prepare;
mod types;

pub use chunker::ParagraphChunker;
pub use config::ChunkerConfig;
pub use error::{ChunkerError, Result};
pub use extract::{extract_filing_text, ExtractStats, TextExtractor, RAW_EXTENSION};
pub use prepare::{CorpusPreparer, PrepareStats};
pub use types::{entity_segment, ChunkId, CHUNK_EXTENSION};

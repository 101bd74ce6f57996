use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Counters reported by one index build run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BuildStats {
    /// `.txt` files found in the chunk directory.
    pub scanned: usize,

    /// Chunks embedded and committed in this run.
    pub indexed: usize,

    /// Chunks already present in the index.
    pub skipped_existing: usize,

    /// Chunks whose trimmed text was empty.
    pub skipped_empty: usize,

    /// Chunk files that could not be read or were not UTF-8.
    pub unreadable: usize,

    /// Batches dropped because the embedding service failed.
    pub failed_batches: usize,

    /// Intermediate persists during the run (the final persist is not counted).
    pub checkpoints: usize,

    /// Index size after the run.
    pub total_entries: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,
}

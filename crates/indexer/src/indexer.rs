use crate::error::{IndexerError, Result};
use crate::index_lock::acquire_index_write_lock;
use crate::scanner::ChunkScanner;
use crate::stats::BuildStats;
use mark_vector_store::{
    check_batch, ChunkRecord, ChunkStore, DataLayout, IndexedCorpus, TextEmbedder,
    VectorStoreError,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_SAVE_EVERY: usize = 10_000;

/// What to do when the embedding service rejects a batch.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedFailurePolicy {
    /// Persist what is committed and stop with an error.
    #[default]
    Abort,
    /// Count the batch as failed and continue with the next one.
    Skip,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildConfig {
    pub batch_size: usize,
    pub save_every: usize,
    pub on_embed_failure: EmbedFailurePolicy,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            save_every: DEFAULT_SAVE_EVERY,
            on_embed_failure: EmbedFailurePolicy::Abort,
        }
    }
}

impl BuildConfig {
    /// Defaults overridden by `BATCH_SIZE` and `SAVE_EVERY`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(batch_size) = env_usize("BATCH_SIZE")? {
            config.batch_size = batch_size;
        }
        if let Some(save_every) = env_usize("SAVE_EVERY")? {
            config.save_every = save_every;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(IndexerError::InvalidConfig(
                "batch_size must be > 0".to_string(),
            ));
        }
        if self.save_every == 0 {
            return Err(IndexerError::InvalidConfig(
                "save_every must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_usize(key: &str) -> Result<Option<usize>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|err| IndexerError::InvalidConfig(format!("{key}='{raw}': {err}"))),
        Err(_) => Ok(None),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BuildProgress {
    /// Pending chunks handled so far (committed, skipped or failed).
    pub processed: usize,
    pub total: usize,
}

pub type ProgressCallback = Arc<dyn Fn(BuildProgress) + Send + Sync>;

/// Offline job that embeds chunk files and appends them to the persisted index.
pub struct CorpusIndexer {
    layout: DataLayout,
    embedder: Arc<dyn TextEmbedder>,
    config: BuildConfig,
    progress: Option<ProgressCallback>,
}

impl fmt::Debug for CorpusIndexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorpusIndexer")
            .field("layout", &self.layout)
            .field("model_id", &self.embedder.model_id())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CorpusIndexer {
    pub fn new(
        layout: DataLayout,
        embedder: Arc<dyn TextEmbedder>,
        config: BuildConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            layout,
            embedder,
            config,
            progress: None,
        })
    }

    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    #[must_use]
    pub const fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Embed chunks that are not yet in the index.
    pub async fn index(&self) -> Result<BuildStats> {
        self.build(false).await
    }

    /// Discard the persisted index and embed every chunk again.
    pub async fn rebuild(&self) -> Result<BuildStats> {
        self.build(true).await
    }

    #[allow(clippy::too_many_lines)]
    async fn build(&self, full: bool) -> Result<BuildStats> {
        let start = Instant::now();
        let mut stats = BuildStats::default();

        // Single writer across processes for the whole run.
        let _write_lock = acquire_index_write_lock(self.layout.lock_path()).await?;

        log::info!(
            "{} index at {} (model={}, batch_size={}, save_every={})",
            if full { "Rebuilding" } else { "Updating" },
            self.layout.index_dir().display(),
            self.embedder.model_id(),
            self.config.batch_size,
            self.config.save_every
        );

        let mut corpus = if full {
            IndexedCorpus::new()
        } else {
            IndexedCorpus::load_if_present(&self.layout)
                .await?
                .unwrap_or_default()
        };

        let dimension = self.embedder.dimension();
        if corpus.dimension() != 0 && corpus.dimension() != dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: corpus.dimension(),
                actual: dimension,
            }
            .into());
        }

        let names = ChunkScanner::new(self.layout.chunks_dir()).scan();
        stats.scanned = names.len();
        let pending: Vec<String> = names
            .into_iter()
            .filter(|name| !corpus.contains_identifier(name))
            .collect();
        stats.skipped_existing = stats.scanned - pending.len();
        if !full {
            log::info!(
                "Incremental: {} new of {} chunk files",
                pending.len(),
                stats.scanned
            );
        }

        let store = ChunkStore::new(self.layout.chunks_dir());
        let mut since_checkpoint = 0usize;
        let mut processed = 0usize;

        for batch in pending.chunks(self.config.batch_size) {
            processed += batch.len();

            let mut identifiers = Vec::with_capacity(batch.len());
            let mut texts = Vec::with_capacity(batch.len());
            for name in batch {
                match store.read(name).await {
                    Ok(Some(text)) => {
                        let trimmed = text.trim();
                        if trimmed.is_empty() {
                            stats.skipped_empty += 1;
                            continue;
                        }
                        identifiers.push(name.clone());
                        texts.push(trimmed.to_string());
                    }
                    Ok(None) => {
                        log::warn!("Chunk {name} disappeared during indexing");
                        stats.unreadable += 1;
                    }
                    Err(err) => {
                        log::warn!("Skipping unreadable chunk {name}: {err}");
                        stats.unreadable += 1;
                    }
                }
            }

            if !texts.is_empty() {
                let embedded = self
                    .embedder
                    .embed_batch(&texts)
                    .await
                    .and_then(|vectors| {
                        check_batch(texts.len(), &vectors, dimension).map(|()| vectors)
                    });
                match embedded {
                    Ok(vectors) => {
                        let records: Vec<ChunkRecord> = identifiers
                            .into_iter()
                            .zip(texts.iter())
                            .map(|(name, text)| ChunkRecord::new(name, text))
                            .collect();
                        corpus.append(&vectors, records)?;
                        stats.indexed += texts.len();
                        since_checkpoint += texts.len();

                        if since_checkpoint >= self.config.save_every {
                            corpus.persist(&self.layout).await?;
                            stats.checkpoints += 1;
                            since_checkpoint = 0;
                            log::info!("Checkpoint: {} entries persisted", corpus.len());
                        }
                    }
                    Err(err @ VectorStoreError::InvalidDimension { .. }) => {
                        return Err(err.into());
                    }
                    Err(err) => match self.config.on_embed_failure {
                        EmbedFailurePolicy::Abort => {
                            if since_checkpoint > 0 {
                                corpus.persist(&self.layout).await?;
                            }
                            log::warn!(
                                "Embedding failed; stopping after {} committed chunks",
                                stats.indexed
                            );
                            return Err(IndexerError::EmbedFailed {
                                first: identifiers.first().cloned().unwrap_or_default(),
                                source: err,
                            });
                        }
                        EmbedFailurePolicy::Skip => {
                            log::warn!(
                                "Embedding failed for {} chunks starting at {}: {err}",
                                texts.len(),
                                identifiers.first().map_or("?", String::as_str)
                            );
                            stats.failed_batches += 1;
                        }
                    },
                }
            }

            if let Some(progress) = &self.progress {
                progress(BuildProgress {
                    processed,
                    total: pending.len(),
                });
            }
        }

        corpus.persist(&self.layout).await?;
        stats.total_entries = corpus.len();

        #[allow(clippy::cast_possible_truncation)]
        {
            stats.time_ms = start.elapsed().as_millis() as u64;
        }
        log::info!("Indexing completed: {stats:?}");

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sizes_are_rejected() {
        let config = BuildConfig {
            batch_size: 0,
            ..BuildConfig::default()
        };
        assert!(config.validate().is_err());

        let config = BuildConfig {
            save_every: 0,
            ..BuildConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(BuildConfig::default().validate().is_ok());
    }

    #[test]
    fn failure_policy_defaults_to_abort() {
        assert_eq!(BuildConfig::default().on_embed_failure, EmbedFailurePolicy::Abort);
        assert_eq!(
            serde_json::from_str::<EmbedFailurePolicy>("\"skip\"").ok(),
            Some(EmbedFailurePolicy::Skip)
        );
    }
}

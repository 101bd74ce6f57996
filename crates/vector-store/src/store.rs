use crate::error::{Result, VectorStoreError};
use crate::flat_index::FlatL2Index;
use crate::metadata::{ChunkRecord, MetadataTable};
use crate::paths::DataLayout;
use crate::types::SearchHit;
use std::path::PathBuf;

struct Staged {
    path: PathBuf,
    tmp: PathBuf,
    bytes: Vec<u8>,
}

impl Staged {
    fn new(path: PathBuf, bytes: Vec<u8>) -> Self {
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        Self {
            path,
            tmp: tmp.into(),
            bytes,
        }
    }
}

/// Vector index plus its row-aligned metadata table.
///
/// Row `i` of the metadata describes vector ordinal `i`. Every mutation goes through
/// [`IndexedCorpus::append`], which commits vectors and records together or not at all.
#[derive(Debug, Clone, Default)]
pub struct IndexedCorpus {
    index: FlatL2Index,
    metadata: MetadataTable,
}

impl IndexedCorpus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads both persisted artifacts. Missing or disagreeing artifacts are fatal.
    pub async fn load(layout: &DataLayout) -> Result<Self> {
        let vectors_path = layout.vectors_path();
        let metadata_path = layout.metadata_path();
        let index = FlatL2Index::load(&vectors_path).await?;
        let metadata = MetadataTable::load(&metadata_path).await?;
        if index.len() != metadata.len() {
            return Err(VectorStoreError::CardinalityMismatch {
                vectors: index.len(),
                metadata: metadata.len(),
            });
        }
        log::info!(
            "Loaded index: {} vectors (dim={}) from {}",
            index.len(),
            index.dimension(),
            vectors_path.display()
        );
        Ok(Self { index, metadata })
    }

    /// Loads the artifacts when both exist and returns `None` when neither does.
    ///
    /// Exactly one artifact on disk is reported as [`VectorStoreError::MissingArtifact`] for the
    /// other one.
    pub async fn load_if_present(layout: &DataLayout) -> Result<Option<Self>> {
        let vectors_path = layout.vectors_path();
        let metadata_path = layout.metadata_path();
        let has_vectors = tokio::fs::try_exists(&vectors_path).await?;
        let has_metadata = tokio::fs::try_exists(&metadata_path).await?;
        match (has_vectors, has_metadata) {
            (false, false) => Ok(None),
            (true, false) => Err(VectorStoreError::MissingArtifact(metadata_path)),
            (false, true) => Err(VectorStoreError::MissingArtifact(vectors_path)),
            (true, true) => Self::load(layout).await.map(Some),
        }
    }

    /// Writes both artifacts as a pair.
    ///
    /// Both files are staged as `*.tmp` before either is renamed into place; if staging fails the
    /// previous pair is left untouched.
    pub async fn persist(&self, layout: &DataLayout) -> Result<()> {
        tokio::fs::create_dir_all(layout.index_dir()).await?;
        let staged = [
            Staged::new(layout.vectors_path(), self.index.to_bytes()?),
            Staged::new(layout.metadata_path(), self.metadata.to_bytes()?),
        ];

        for file in &staged {
            if let Err(err) = tokio::fs::write(&file.tmp, &file.bytes).await {
                for file in &staged {
                    let _ = tokio::fs::remove_file(&file.tmp).await;
                }
                return Err(err.into());
            }
        }
        for file in &staged {
            tokio::fs::rename(&file.tmp, &file.path).await?;
        }

        log::debug!(
            "Persisted {} entries to {}",
            self.len(),
            layout.index_dir().display()
        );
        Ok(())
    }

    /// Appends a batch of `(vector, record)` pairs. The batch is validated as a whole first.
    pub fn append(&mut self, vectors: &[Vec<f32>], records: Vec<ChunkRecord>) -> Result<()> {
        if vectors.len() != records.len() {
            return Err(VectorStoreError::CardinalityMismatch {
                vectors: vectors.len(),
                metadata: records.len(),
            });
        }
        self.index.validate_batch(vectors)?;
        self.index.append(vectors)?;
        self.metadata.extend(records);
        Ok(())
    }

    /// Up to `min(k, len)` nearest entries in ascending squared distance.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let neighbors = self.index.search(query, k)?;
        let mut hits = Vec::with_capacity(neighbors.len());
        for (ordinal, distance) in neighbors {
            let Some(record) = self.metadata.get(ordinal) else {
                log::warn!("Index ordinal {ordinal} has no metadata row; skipping");
                continue;
            };
            hits.push(SearchHit {
                ordinal,
                distance,
                record: record.clone(),
            });
        }
        Ok(hits)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Vector dimension, 0 while nothing has been appended.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    #[must_use]
    pub fn record(&self, ordinal: usize) -> Option<&ChunkRecord> {
        self.metadata.get(ordinal)
    }

    #[must_use]
    pub fn contains_identifier(&self, identifier: &str) -> bool {
        self.metadata.contains(identifier)
    }

    pub fn records(&self) -> impl Iterator<Item = &ChunkRecord> {
        self.metadata.iter()
    }
}

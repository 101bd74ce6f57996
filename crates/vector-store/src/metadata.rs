use crate::error::{Result, VectorStoreError};
use crate::paths::DataLayout;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub const METADATA_SCHEMA_VERSION: u32 = 1;

/// Per-chunk row aligned with the vector at the same ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub filename: String,
    /// Character count of the indexed text.
    pub length: usize,
    pub path: String,
}

impl ChunkRecord {
    #[must_use]
    pub fn new(filename: impl Into<String>, text: &str) -> Self {
        let filename = filename.into();
        Self {
            path: DataLayout::relative_chunk_path(&filename),
            length: text.chars().count(),
            filename,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedMetadata {
    schema_version: u32,
    entries: Vec<ChunkRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct MetadataTable {
    entries: Vec<ChunkRecord>,
    identifiers: HashSet<String>,
}

impl MetadataTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, ordinal: usize) -> Option<&ChunkRecord> {
        self.entries.get(ordinal)
    }

    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.identifiers.contains(identifier)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChunkRecord> {
        self.entries.iter()
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = ChunkRecord>) {
        for record in records {
            self.identifiers.insert(record.filename.clone());
            self.entries.push(record);
        }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            return Err(VectorStoreError::MissingArtifact(path.to_path_buf()));
        }
        let bytes = tokio::fs::read(path).await?;
        let persisted: PersistedMetadata =
            serde_json::from_slice(&bytes).map_err(|err| VectorStoreError::CorruptIndex {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;
        if persisted.schema_version != METADATA_SCHEMA_VERSION {
            return Err(VectorStoreError::CorruptIndex {
                path: path.to_path_buf(),
                reason: format!(
                    "unsupported schema_version {} (expected {METADATA_SCHEMA_VERSION})",
                    persisted.schema_version
                ),
            });
        }
        let mut table = Self::new();
        table.extend(persisted.entries);
        Ok(table)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let persisted = PersistedMetadata {
            schema_version: METADATA_SCHEMA_VERSION,
            entries: self.entries.clone(),
        };
        Ok(serde_json::to_vec_pretty(&persisted)?)
    }
}

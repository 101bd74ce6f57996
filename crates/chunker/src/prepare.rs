use crate::chunker::ParagraphChunker;
use crate::error::Result;
use crate::types::{ChunkId, CHUNK_EXTENSION};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Outcome of a corpus preparation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareStats {
    /// Documents chunked in this run
    pub documents: usize,

    /// Chunk files written
    pub chunks: usize,

    /// Documents that already had chunk files
    pub skipped_existing: usize,

    /// Documents that could not be read as UTF-8 text
    pub unreadable: usize,
}

/// Turns cleaned filing text files into chunk files.
pub struct CorpusPreparer {
    input_dir: PathBuf,
    output_dir: PathBuf,
    chunker: ParagraphChunker,
}

impl CorpusPreparer {
    pub fn new(
        input_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        chunker: ParagraphChunker,
    ) -> Self {
        Self {
            input_dir: input_dir.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
            chunker,
        }
    }

    /// Chunk every document that has no chunk files yet.
    pub async fn prepare(&self) -> Result<PrepareStats> {
        let mut stats = PrepareStats::default();
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let chunked_documents: HashSet<String> =
            list_files_with_extension(&self.output_dir, CHUNK_EXTENSION)
                .await?
                .iter()
                .filter_map(|name| ChunkId::parse(name).ok())
                .map(|id| id.document().to_string())
                .collect();

        for name in list_files_with_extension(&self.input_dir, CHUNK_EXTENSION).await? {
            let Some(document) = name.strip_suffix(&format!(".{CHUNK_EXTENSION}")) else {
                continue;
            };
            if chunked_documents.contains(document) {
                stats.skipped_existing += 1;
                continue;
            }

            let path = self.input_dir.join(&name);
            let text = match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(err) => {
                    log::warn!("Skipping unreadable document {}: {err}", path.display());
                    stats.unreadable += 1;
                    continue;
                }
            };

            let chunks = self.chunker.chunk(&text);
            for (idx, chunk) in chunks.iter().enumerate() {
                let id = ChunkId::new(document, idx + 1);
                tokio::fs::write(self.output_dir.join(id.file_name()), chunk).await?;
            }

            log::info!("Chunked {name} into {} chunks", chunks.len());
            stats.documents += 1;
            stats.chunks += chunks.len();
        }

        Ok(stats)
    }
}

/// Names of files with extension `ext` directly inside `dir`, sorted. A missing directory is
/// empty.
pub(crate) async fn list_files_with_extension(dir: &Path, ext: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(err) => return Err(err.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if Path::new(&name)
            .extension()
            .is_some_and(|found| found == ext)
        {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

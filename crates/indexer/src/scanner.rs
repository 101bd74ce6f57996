use mark_chunker::CHUNK_EXTENSION;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Finds chunk files (flat directory of `*.txt`), sorted by file name.
pub struct ChunkScanner {
    root: PathBuf,
}

impl ChunkScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// File names of every chunk under the root. A missing root yields nothing.
    pub fn scan(&self) -> Vec<String> {
        if !self.root.is_dir() {
            log::warn!("Chunk directory {} does not exist", self.root.display());
            return vec![];
        }

        let mut names = Vec::new();
        for result in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            match result {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let Some(name) = entry.file_name().to_str() else {
                        log::warn!("Skipping non-UTF-8 file name {:?}", entry.file_name());
                        continue;
                    };
                    if Self::is_chunk_file(name) {
                        names.push(name.to_string());
                    }
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        names.sort();
        log::info!("Found {} chunk files", names.len());
        names
    }

    fn is_chunk_file(name: &str) -> bool {
        !name.starts_with('.')
            && Path::new(name)
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == CHUNK_EXTENSION)
    }
}

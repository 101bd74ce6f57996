use std::path::{Path, PathBuf};

pub const DATA_DIR_NAME: &str = "data";
pub const DOCUMENTS_RAW_DIR_NAME: &str = "documents_raw";
pub const TEXT_CLEAN_DIR_NAME: &str = "text_clean";
pub const CHUNKS_DIR_NAME: &str = "chunks";
pub const INDEX_DIR_NAME: &str = "index";

pub const VECTORS_FILE_NAME: &str = "company_index.vec";
pub const METADATA_FILE_NAME: &str = "metadata.json";
pub const LOCK_FILE_NAME: &str = "index.lock";

/// On-disk layout of a Mark data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    /// Layout rooted at `<project>/data`.
    #[must_use]
    pub fn for_project_root(root: &Path) -> Self {
        Self::new(root.join(DATA_DIR_NAME))
    }

    /// Layout rooted directly at `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: data_dir.into(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Raw filing HTML as downloaded from EDGAR.
    #[must_use]
    pub fn documents_raw_dir(&self) -> PathBuf {
        self.root.join(DOCUMENTS_RAW_DIR_NAME)
    }

    #[must_use]
    pub fn text_clean_dir(&self) -> PathBuf {
        self.root.join(TEXT_CLEAN_DIR_NAME)
    }

    #[must_use]
    pub fn chunks_dir(&self) -> PathBuf {
        self.root.join(CHUNKS_DIR_NAME)
    }

    #[must_use]
    pub fn index_dir(&self) -> PathBuf {
        self.root.join(INDEX_DIR_NAME)
    }

    #[must_use]
    pub fn vectors_path(&self) -> PathBuf {
        self.index_dir().join(VECTORS_FILE_NAME)
    }

    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.index_dir().join(METADATA_FILE_NAME)
    }

    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.index_dir().join(LOCK_FILE_NAME)
    }

    /// Path of a chunk relative to the data root's parent, as recorded in metadata.
    #[must_use]
    pub fn relative_chunk_path(identifier: &str) -> String {
        format!("{DATA_DIR_NAME}/{CHUNKS_DIR_NAME}/{identifier}")
    }
}

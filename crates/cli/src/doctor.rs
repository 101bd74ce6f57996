use mark_vector_store::{
    DataLayout, EmbeddingConfig, EmbeddingModel, FlatL2Index, MetadataTable, TextEmbedder,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct DoctorReport {
    pub root: String,
    pub embedding_mode: String,
    pub embedding_model: String,
    pub embedding_dimension: Option<usize>,
    pub vectors: Option<usize>,
    pub metadata_rows: Option<usize>,
    pub index_dimension: Option<usize>,
    pub aligned: bool,
    pub chunk_files: usize,
    pub missing_chunk_files: Vec<String>,
    pub issues: Vec<String>,
}

impl DoctorReport {
    pub(crate) fn ok(&self) -> bool {
        self.issues.is_empty()
    }
}

const MAX_LISTED_MISSING: usize = 20;

/// Inspects the persisted index without going through the strict loader, so every problem
/// is reported instead of only the first.
pub(crate) async fn diagnose(layout: &DataLayout, embedding: &EmbeddingConfig) -> DoctorReport {
    let mut issues = Vec::new();

    let (embedding_dimension, embedding_model) = match EmbeddingModel::new(embedding.clone()) {
        Ok(model) => (Some(model.dimension()), model.model_id().to_string()),
        Err(err) => {
            issues.push(format!("embedding backend unavailable: {err}"));
            (None, embedding.model_id.clone())
        }
    };

    let index = match FlatL2Index::load(&layout.vectors_path()).await {
        Ok(index) => Some(index),
        Err(err) => {
            issues.push(err.to_string());
            None
        }
    };
    let metadata = match MetadataTable::load(&layout.metadata_path()).await {
        Ok(metadata) => Some(metadata),
        Err(err) => {
            issues.push(err.to_string());
            None
        }
    };

    let vectors = index.as_ref().map(FlatL2Index::len);
    let metadata_rows = metadata.as_ref().map(MetadataTable::len);
    let index_dimension = index
        .as_ref()
        .filter(|index| !index.is_empty())
        .map(FlatL2Index::dimension);
    let aligned = matches!((vectors, metadata_rows), (Some(v), Some(m)) if v == m);
    if let (Some(v), Some(m)) = (vectors, metadata_rows) {
        if v != m {
            issues.push(format!("{v} vectors but {m} metadata rows"));
        }
    }
    if let (Some(index_dim), Some(embed_dim)) = (index_dimension, embedding_dimension) {
        if index_dim != embed_dim {
            issues.push(format!(
                "index dimension {index_dim} does not match embedding dimension {embed_dim}"
            ));
        }
    }

    let chunk_files = count_chunk_files(layout).await;
    let mut missing_chunk_files = Vec::new();
    let mut missing_total = 0usize;
    if let Some(metadata) = &metadata {
        for record in metadata.iter() {
            let path = layout.chunks_dir().join(&record.filename);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                continue;
            }
            missing_total += 1;
            if missing_chunk_files.len() < MAX_LISTED_MISSING {
                missing_chunk_files.push(record.filename.clone());
            }
        }
    }
    if missing_total > 0 {
        issues.push(format!("{missing_total} indexed chunks have no chunk file"));
    }

    DoctorReport {
        root: layout.root().display().to_string(),
        embedding_mode: embedding.mode.as_str().to_string(),
        embedding_model,
        embedding_dimension,
        vectors,
        metadata_rows,
        index_dimension,
        aligned,
        chunk_files,
        missing_chunk_files,
        issues,
    }
}

async fn count_chunk_files(layout: &DataLayout) -> usize {
    let Ok(mut entries) = tokio::fs::read_dir(layout.chunks_dir()).await else {
        return 0;
    };
    let mut count = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some(mark_chunker::CHUNK_EXTENSION) {
            count += 1;
        }
    }
    count
}

use crate::metadata::ChunkRecord;
use mark_chunker::entity_segment;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub ordinal: usize,
    /// Squared Euclidean distance; lower is closer.
    pub distance: f32,
    pub record: ChunkRecord,
}

impl SearchHit {
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.record.filename
    }

    /// Owning entity (ticker) as written in the identifier.
    #[must_use]
    pub fn entity(&self) -> &str {
        entity_segment(&self.record.filename)
    }
}

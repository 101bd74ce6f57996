use crate::error::{ChunkerError, Result};
use serde::{Deserialize, Serialize};

pub const CHUNK_EXTENSION: &str = "txt";
const CHUNK_MARKER: &str = "_chunk";

/// Parsed chunk identifier: `{TICKER}_{FORM}_{DOCREF}_chunk{N}.txt`.
///
/// Only the `_chunk{N}.txt` suffix is mandatory; the entity is whatever precedes the first `_`
/// of the source document name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkId {
    document: String,
    ordinal: usize,
}

impl ChunkId {
    /// Identifier of the `ordinal`-th (1-based) chunk of `document`.
    #[must_use]
    pub fn new(document: impl Into<String>, ordinal: usize) -> Self {
        Self {
            document: document.into(),
            ordinal,
        }
    }

    pub fn parse(identifier: &str) -> Result<Self> {
        let stem = identifier
            .strip_suffix(CHUNK_EXTENSION)
            .and_then(|s| s.strip_suffix('.'))
            .ok_or_else(|| ChunkerError::invalid_identifier(identifier))?;
        let (document, ordinal) = stem
            .rsplit_once(CHUNK_MARKER)
            .ok_or_else(|| ChunkerError::invalid_identifier(identifier))?;
        let ordinal = ordinal
            .parse::<usize>()
            .map_err(|_| ChunkerError::invalid_identifier(identifier))?;
        if document.is_empty() || ordinal == 0 {
            return Err(ChunkerError::invalid_identifier(identifier));
        }
        Ok(Self::new(document, ordinal))
    }

    /// Source document name (the cleaned text file stem).
    #[must_use]
    pub fn document(&self) -> &str {
        &self.document
    }

    #[must_use]
    pub const fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Owning entity as written in the identifier (not normalized).
    #[must_use]
    pub fn entity(&self) -> &str {
        entity_segment(&self.document)
    }

    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}{CHUNK_MARKER}{}.{CHUNK_EXTENSION}",
            self.document, self.ordinal
        )
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Entity segment of any identifier: everything before the first `_`.
#[must_use]
pub fn entity_segment(identifier: &str) -> &str {
    identifier
        .split_once('_')
        .map_or(identifier, |(head, _)| head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_filing_chunk_names() {
        let id = ChunkId::parse("AAPL_10-K_0000320193-23-000106_chunk17.txt").unwrap();
        assert_eq!(id.entity(), "AAPL");
        assert_eq!(id.document(), "AAPL_10-K_0000320193-23-000106");
        assert_eq!(id.ordinal(), 17);
        assert_eq!(id.file_name(), "AAPL_10-K_0000320193-23-000106_chunk17.txt");
    }

    #[test]
    fn rejects_names_without_chunk_suffix() {
        assert!(ChunkId::parse("AAPL_10-K.txt").is_err());
        assert!(ChunkId::parse("AAPL_chunk0.txt").is_err());
        assert!(ChunkId::parse("AAPL_chunk3.md").is_err());
    }

    #[test]
    fn entity_segment_of_bare_name_is_whole_name() {
        assert_eq!(entity_segment("MSFT"), "MSFT");
        assert_eq!(entity_segment("brk.b_10-Q_x_chunk1.txt"), "brk.b");
    }
}

use crate::error::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Read-only access to chunk files under a fixed root.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full text of the chunk, or `None` when it does not exist.
    ///
    /// Identifiers that would escape the root are treated as not found. Non-UTF-8 content is an
    /// error so callers can count it separately from missing files.
    pub async fn read(&self, identifier: &str) -> Result<Option<String>> {
        let Some(path) = self.resolve(identifier) else {
            log::debug!("Rejected chunk identifier {identifier:?}");
            return Ok(None);
        };
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn resolve(&self, identifier: &str) -> Option<PathBuf> {
        if identifier.is_empty()
            || identifier.contains('/')
            || identifier.contains('\\')
            || identifier.contains("..")
        {
            return None;
        }
        Some(self.root.join(identifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reads_existing_and_reports_missing() {
        let temp = TempDir::new().unwrap();
        tokio::fs::write(temp.path().join("AAA_10-K_1_chunk1.txt"), "Revenue rose.")
            .await
            .unwrap();
        let store = ChunkStore::new(temp.path());

        assert_eq!(
            store.read("AAA_10-K_1_chunk1.txt").await.unwrap().as_deref(),
            Some("Revenue rose.")
        );
        assert_eq!(store.read("AAA_10-K_1_chunk2.txt").await.unwrap(), None);
    }

    #[tokio::test]
    async fn path_traversal_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = ChunkStore::new(temp.path().join("chunks"));
        tokio::fs::write(temp.path().join("secret.txt"), "x")
            .await
            .unwrap();

        assert_eq!(store.read("../secret.txt").await.unwrap(), None);
        assert_eq!(store.read("sub/secret.txt").await.unwrap(), None);
        assert_eq!(store.read("").await.unwrap(), None);
    }

    #[tokio::test]
    async fn non_utf8_is_an_error() {
        let temp = TempDir::new().unwrap();
        tokio::fs::write(temp.path().join("BAD_chunk1.txt"), [0xff_u8, 0xfe])
            .await
            .unwrap();
        let store = ChunkStore::new(temp.path());
        assert!(store.read("BAD_chunk1.txt").await.is_err());
    }
}

use crate::{IndexerError, Result};
use fs2::FileExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const SLOW_WAIT: Duration = Duration::from_millis(100);

/// Exclusive advisory lock on `data/index/index.lock`, released on drop.
pub(crate) struct IndexWriteLock {
    file: std::fs::File,
}

impl Drop for IndexWriteLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Blocks (off the runtime) until no other build holds the lock.
pub(crate) async fn acquire_index_write_lock(path: PathBuf) -> Result<IndexWriteLock> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    tokio::task::spawn_blocking(move || -> Result<IndexWriteLock> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| {
                IndexerError::Other(format!("cannot open lock file {}: {err}", path.display()))
            })?;

        let start = Instant::now();
        file.lock_exclusive().map_err(|err| {
            IndexerError::Other(format!("cannot lock {}: {err}", path.display()))
        })?;
        let waited = start.elapsed();
        if waited > SLOW_WAIT {
            log::info!("Another build held {} for {waited:?}", path.display());
        }

        Ok(IndexWriteLock { file })
    })
    .await
    .map_err(|err| IndexerError::Other(format!("index lock task failed: {err}")))?
}

//! Local chunk persistence
//!
//! Every chunk is written to `{logs_dir}/{job_id}-{sequence}.log` before it
//! is uploaded. The file is the durable record of the chunk whether or not
//! the upload succeeds.

use anyhow::{Context, Result};
use reef_core::domain::job::validate_job_id;
use reef_core::domain::log::LogChunk;
use std::path::PathBuf;
use tracing::debug;

/// Writes chunks to a local directory
#[derive(Debug, Clone)]
pub struct LocalChunkStore {
    dir: PathBuf,
}

impl LocalChunkStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path a chunk is persisted to
    pub fn path_for(&self, chunk: &LogChunk) -> PathBuf {
        self.dir.join(chunk.file_name())
    }

    /// Creates the log directory if it does not exist yet
    pub async fn prepare(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create log directory {}", self.dir.display()))
    }

    /// Writes a chunk, creating the file or truncating an existing one
    ///
    /// Chunks whose job id is not a plain file name component are refused,
    /// so nothing is ever written outside the log directory.
    pub async fn persist(&self, chunk: &LogChunk) -> Result<PathBuf> {
        validate_job_id(&chunk.job_id)?;
        let path = self.path_for(chunk);
        tokio::fs::write(&path, &chunk.data)
            .await
            .with_context(|| format!("Failed to write chunk to {}", path.display()))?;

        debug!(
            "Persisted chunk {} of job {} ({} bytes) to {}",
            chunk.sequence,
            chunk.job_id,
            chunk.len(),
            path.display()
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(sequence: u64, data: &[u8]) -> LogChunk {
        LogChunk {
            job_id: "J1".to_string(),
            sequence,
            data: data.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_persist_writes_file_named_after_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalChunkStore::new(dir.path().join("logs"));
        store.prepare().await.unwrap();

        let path = store.persist(&chunk(2, b"hello")).await.unwrap();

        assert_eq!(path, dir.path().join("logs").join("J1-2.log"));
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_persist_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalChunkStore::new(dir.path());

        store.persist(&chunk(0, b"a much longer payload")).await.unwrap();
        let path = store.persist(&chunk(0, b"short")).await.unwrap();

        assert_eq!(std::fs::read(path).unwrap(), b"short");
    }

    #[tokio::test]
    async fn test_persist_without_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalChunkStore::new(dir.path().join("missing"));
        assert!(store.persist(&chunk(0, b"x")).await.is_err());
    }

    #[tokio::test]
    async fn test_persist_refuses_job_id_escaping_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalChunkStore::new(dir.path().join("logs"));
        store.prepare().await.unwrap();

        let escaping = LogChunk {
            job_id: "../escaped".to_string(),
            sequence: 0,
            data: b"x".to_vec(),
        };

        assert!(store.persist(&escaping).await.is_err());
        assert!(!dir.path().join("escaped-0.log").exists());
    }
}

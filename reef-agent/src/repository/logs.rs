//! Logs repository
//!
//! Ships log chunks to the log-ingestion service. Buffering, chunking and
//! retry policy live in the service layer.

use async_trait::async_trait;
use reef_client::{LogServiceClient, Result};
use reef_core::domain::log::LogChunk;

/// Repository trait for uploading log chunks
#[async_trait]
pub trait LogRepository: Send + Sync {
    /// Uploads a single chunk, tagged with its job id and sequence number
    async fn upload_chunk(&self, chunk: &LogChunk) -> Result<()>;
}

#[async_trait]
impl LogRepository for LogServiceClient {
    async fn upload_chunk(&self, chunk: &LogChunk) -> Result<()> {
        LogServiceClient::upload_chunk(self, &chunk.job_id, chunk.sequence, chunk.data.clone())
            .await
    }
}

//! Log-ingestion service endpoints

use reqwest::Client;
use std::time::Duration;

use crate::error::{ClientError, Result};
use crate::{check_status, normalize_base_url};

/// HTTP client for the log-ingestion service
#[derive(Debug, Clone)]
pub struct LogServiceClient {
    /// Service host (e.g., "http://localhost:1235")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl LogServiceClient {
    /// Create a new log service client without request timeouts
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a log service client whose requests give up after `timeout`
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::RequestFailed)?;
        Ok(Self::with_client(base_url, client))
    }

    /// Create a new log service client with a custom HTTP client
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            client,
        }
    }

    /// Get the base URL of the log service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upload one log chunk
    ///
    /// Sends the raw bytes as `text/plain` to `/job/logs`, tagged with the job
    /// id and the chunk's sequence number. Only the status matters; the
    /// response body is ignored.
    ///
    /// # Arguments
    /// * `job_id` - The job the chunk belongs to
    /// * `sequence` - The chunk's sequence number within the job
    /// * `data` - The chunk bytes
    pub async fn upload_chunk(&self, job_id: &str, sequence: u64, data: Vec<u8>) -> Result<()> {
        let url = format!("{}/job/logs", self.base_url);
        let sequence = sequence.to_string();
        let response = self
            .client
            .post(&url)
            .query(&[("jobId", job_id), ("sequence", sequence.as_str())])
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(data)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_bytes, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_upload_chunk_sends_raw_bytes() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/job/logs"))
            .and(query_param("jobId", "J1"))
            .and(query_param("sequence", "7"))
            .and(header("Content-Type", "text/plain"))
            .and(body_bytes(b"hello\n".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = LogServiceClient::new(server.uri());
        client
            .upload_chunk("J1", 7, b"hello\n".to_vec())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upload_chunk_server_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/job/logs"))
            .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
            .mount(&server)
            .await;

        let client = LogServiceClient::new(server.uri());
        let err = client.upload_chunk("J1", 0, b"x".to_vec()).await.unwrap_err();

        assert!(err.is_server_error());
        assert!(err.to_string().contains("disk full"));
    }

    #[tokio::test]
    async fn test_upload_chunk_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/job/logs"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client =
            LogServiceClient::with_timeout(server.uri(), Duration::from_millis(100)).unwrap();
        let err = client.upload_chunk("J1", 0, b"x".to_vec()).await.unwrap_err();

        assert!(err.is_transport());
    }
}

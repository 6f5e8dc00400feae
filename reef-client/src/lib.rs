//! Reef HTTP Client
//!
//! Typed HTTP clients for the two services a Reef agent talks to:
//! - [`QueueClient`]: the job-queue server (ping for work, acquire a job)
//! - [`LogServiceClient`]: the log-ingestion service (upload log chunks)
//!
//! # Example
//!
//! ```no_run
//! use reef_client::QueueClient;
//! use reef_core::domain::agent::AgentIdentity;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = QueueClient::new("http://localhost:1235");
//!     let agent = AgentIdentity::new("agent-1", "default");
//!
//!     if let Some(job) = client.ping(&agent).await? {
//!         println!("Job {} has {} command(s)", job.id, job.commands.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod logs;
mod queue;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use logs::LogServiceClient;

use reqwest::Client;

/// HTTP client for the job-queue server
///
/// Covers the two endpoints an agent needs:
/// - `GET /ping` to ask for an assigned job
/// - `POST /job/acquire` to claim it exclusively
#[derive(Debug, Clone)]
pub struct QueueClient {
    /// Base URL of the queue server (e.g., "http://localhost:1235")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl QueueClient {
    /// Create a new queue client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the queue server (e.g., "http://localhost:1235")
    ///
    /// # Example
    /// ```
    /// use reef_client::QueueClient;
    ///
    /// let client = QueueClient::new("http://localhost:1235");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new queue client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            client,
        }
    }

    /// Get the base URL of the queue server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Strips trailing slashes so paths can be appended with `format!`
pub(crate) fn normalize_base_url(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}

/// Turns a non-success response into an [`ClientError::ApiError`]
///
/// Returns the response untouched when the status is a success.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = QueueClient::new("http://localhost:1235");
        assert_eq!(client.base_url(), "http://localhost:1235");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = QueueClient::new("http://localhost:1235/");
        assert_eq!(client.base_url(), "http://localhost:1235");
    }

    #[test]
    fn test_client_with_custom_client() {
        let http_client = Client::new();
        let client = QueueClient::with_client("http://localhost:1235", http_client);
        assert_eq!(client.base_url(), "http://localhost:1235");
    }
}

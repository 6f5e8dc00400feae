//! Queue server endpoints

use reef_core::domain::agent::AgentIdentity;
use reef_core::domain::job::Job;
use reef_core::dto::job::PingResponse;
use reqwest::StatusCode;
use tracing::debug;

use crate::QueueClient;
use crate::error::{ClientError, Result};

impl QueueClient {
    // =============================================================================
    // Job Discovery
    // =============================================================================

    /// Ask the queue server whether a job is assigned to this agent
    ///
    /// # Returns
    /// * `Ok(Some(job))` - the server answered 200 with a job body
    /// * `Ok(None)` - any other status; no job is available yet
    /// * `Err(_)` - the server could not be reached, or a 200 body was malformed
    ///   or named a job id that is not a plain file name component
    pub async fn ping(&self, agent: &AgentIdentity) -> Result<Option<Job>> {
        let url = format!("{}/ping", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("agentId", agent.id.as_str()), ("queue", agent.queue.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!("Ping for {} returned {}, no job available", agent, status);
            return Ok(None);
        }

        let body = response.bytes().await?;
        let ping: PingResponse = serde_json::from_slice(&body).map_err(|e| {
            ClientError::ParseError(format!("Failed to parse ping response: {}", e))
        })?;

        let job = Job::try_from(ping).map_err(|e| ClientError::ParseError(e.to_string()))?;
        Ok(Some(job))
    }

    // =============================================================================
    // Job Claiming
    // =============================================================================

    /// Try to claim a job exclusively for an agent
    ///
    /// # Returns
    /// `Ok(true)` only when the server answers 200. Any other status means the
    /// job went to another agent or the server refused the claim.
    pub async fn acquire_job(&self, job_id: &str, agent_id: &str) -> Result<bool> {
        if job_id.is_empty() {
            return Err(ClientError::InvalidRequest(
                "job id cannot be empty".to_string(),
            ));
        }

        let url = format!("{}/job/acquire", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("jobId", job_id), ("agentId", agent_id)])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!("Claim of job {} by {} refused with {}", job_id, agent_id, status);
            return Ok(false);
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn agent() -> AgentIdentity {
        AgentIdentity::new("agent-1", "linux")
    }

    #[tokio::test]
    async fn test_ping_returns_assigned_job() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(query_param("agentId", "agent-1"))
            .and(query_param("queue", "linux"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"jobId":"J1","commands":["echo hi","false","echo bye"]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = QueueClient::new(server.uri());
        let job = client.ping(&agent()).await.unwrap().unwrap();

        assert_eq!(job.id, "J1");
        assert_eq!(job.commands, vec!["echo hi", "false", "echo bye"]);
    }

    #[tokio::test]
    async fn test_ping_non_ok_status_means_no_job() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = QueueClient::new(server.uri());
        assert!(client.ping(&agent()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ping_path_like_job_id_is_parse_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"jobId":"../escaped","commands":["echo hi"]}"#,
            ))
            .mount(&server)
            .await;

        let client = QueueClient::new(server.uri());
        let result = client.ping(&agent()).await;
        assert!(matches!(result, Err(ClientError::ParseError(_))));
    }

    #[tokio::test]
    async fn test_ping_malformed_body_is_parse_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = QueueClient::new(server.uri());
        let result = client.ping(&agent()).await;
        assert!(matches!(result, Err(ClientError::ParseError(_))));
    }

    #[tokio::test]
    async fn test_ping_unreachable_server_is_transport_error() {
        let client = QueueClient::new("http://127.0.0.1:1");
        let err = client.ping(&agent()).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_acquire_job_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/job/acquire"))
            .and(query_param("jobId", "J1"))
            .and(query_param("agentId", "agent-1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = QueueClient::new(server.uri());
        assert!(client.acquire_job("J1", "agent-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_acquire_job_conflict() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/job/acquire"))
            .respond_with(ResponseTemplate::new(409).set_body_string("already taken"))
            .mount(&server)
            .await;

        let client = QueueClient::new(server.uri());
        assert!(!client.acquire_job("J1", "agent-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_acquire_job_rejects_empty_id() {
        let client = QueueClient::new("http://127.0.0.1:1");
        let result = client.acquire_job("", "agent-1").await;
        assert!(matches!(result, Err(ClientError::InvalidRequest(_))));
    }
}

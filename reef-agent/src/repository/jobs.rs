//! Jobs repository
//!
//! Handles the queue server side of the agent:
//! - Pinging for an assigned job
//! - Claiming a job exclusively

use async_trait::async_trait;
use reef_client::{QueueClient, Result};
use reef_core::domain::agent::AgentIdentity;
use reef_core::domain::job::Job;

/// Repository trait for job-related operations with the queue server
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Asks whether a job is assigned to this agent
    ///
    /// `Ok(None)` means "no job yet"; `Err` means the server could not be
    /// reached or answered with something unreadable.
    async fn ping(&self, agent: &AgentIdentity) -> Result<Option<Job>>;

    /// Claims a job for this agent
    ///
    /// `Ok(true)` only when the server granted the claim.
    async fn acquire_job(&self, job_id: &str, agent_id: &str) -> Result<bool>;
}

#[async_trait]
impl JobRepository for QueueClient {
    async fn ping(&self, agent: &AgentIdentity) -> Result<Option<Job>> {
        QueueClient::ping(self, agent).await
    }

    async fn acquire_job(&self, job_id: &str, agent_id: &str) -> Result<bool> {
        QueueClient::acquire_job(self, job_id, agent_id).await
    }
}

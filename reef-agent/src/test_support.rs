//! In-memory fakes of the repository traits for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use reef_client::{ClientError, Result};
use reef_core::domain::agent::AgentIdentity;
use reef_core::domain::job::Job;
use reef_core::domain::log::LogChunk;
use std::collections::VecDeque;
use std::time::Duration;

use crate::repository::{JobRepository, LogRepository};

/// Records successfully uploaded chunks; can be told to fail or be slow
pub struct RecordingLogRepository {
    chunks: Mutex<Vec<LogChunk>>,
    attempts: Mutex<usize>,
    failures_left: Mutex<Option<usize>>,
    delay: Duration,
}

impl RecordingLogRepository {
    pub fn new() -> Self {
        Self {
            chunks: Mutex::new(Vec::new()),
            attempts: Mutex::new(0),
            failures_left: Mutex::new(Some(0)),
            delay: Duration::ZERO,
        }
    }

    /// Every upload fails
    pub fn failing() -> Self {
        Self {
            failures_left: Mutex::new(None),
            ..Self::new()
        }
    }

    /// The first `n` uploads fail, later ones succeed
    pub fn failing_first(n: usize) -> Self {
        Self {
            failures_left: Mutex::new(Some(n)),
            ..Self::new()
        }
    }

    /// Every upload takes `delay`
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn chunks(&self) -> Vec<LogChunk> {
        self.chunks.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

#[async_trait]
impl LogRepository for RecordingLogRepository {
    async fn upload_chunk(&self, chunk: &LogChunk) -> Result<()> {
        *self.attempts.lock() += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let fail = {
            let mut failures_left = self.failures_left.lock();
            match failures_left.as_mut() {
                None => true,
                Some(0) => false,
                Some(n) => {
                    *n -= 1;
                    true
                }
            }
        };
        if fail {
            return Err(ClientError::api_error(503, "log service unavailable"));
        }

        self.chunks.lock().push(chunk.clone());
        Ok(())
    }
}

/// What the fake queue answers to one ping
pub enum PingReply {
    NoJob,
    Job(Job),
    /// A 200 whose body cannot be decoded
    Malformed,
}

/// Queue server fake answering pings from a script
///
/// Once the script runs out every ping answers "no job". Claims are answered
/// from their own script, then with `grant_claims`.
pub struct ScriptedJobRepository {
    replies: Mutex<VecDeque<PingReply>>,
    claim_replies: Mutex<VecDeque<bool>>,
    grant_claims: bool,
    pings: Mutex<usize>,
    claims: Mutex<Vec<(String, String)>>,
}

impl ScriptedJobRepository {
    pub fn new(replies: Vec<PingReply>, grant_claims: bool) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            claim_replies: Mutex::new(VecDeque::new()),
            grant_claims,
            pings: Mutex::new(0),
            claims: Mutex::new(Vec::new()),
        }
    }

    /// Answers claims in `claim_replies` order, granting any later ones
    pub fn with_claims(replies: Vec<PingReply>, claim_replies: Vec<bool>) -> Self {
        Self {
            claim_replies: Mutex::new(claim_replies.into()),
            ..Self::new(replies, true)
        }
    }

    pub fn pings(&self) -> usize {
        *self.pings.lock()
    }

    pub fn claims(&self) -> Vec<(String, String)> {
        self.claims.lock().clone()
    }
}

#[async_trait]
impl JobRepository for ScriptedJobRepository {
    async fn ping(&self, _agent: &AgentIdentity) -> Result<Option<Job>> {
        *self.pings.lock() += 1;
        let reply = self.replies.lock().pop_front().unwrap_or(PingReply::NoJob);
        match reply {
            PingReply::NoJob => Ok(None),
            PingReply::Job(job) => Ok(Some(job)),
            PingReply::Malformed => Err(ClientError::ParseError(
                "Failed to parse ping response: expected value at line 1 column 1".to_string(),
            )),
        }
    }

    async fn acquire_job(&self, job_id: &str, agent_id: &str) -> Result<bool> {
        self.claims
            .lock()
            .push((job_id.to_string(), agent_id.to_string()));
        let granted = self
            .claim_replies
            .lock()
            .pop_front()
            .unwrap_or(self.grant_claims);
        Ok(granted)
    }
}

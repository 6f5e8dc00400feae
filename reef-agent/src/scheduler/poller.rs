//! Job poller
//!
//! Pings the queue server until a job is assigned, claims it and runs it.
//!
//! "No job yet" is retried at the fixed poll interval. Failing to reach the
//! queue server (or getting an unreadable answer) is retried with a doubling
//! backoff, and gives up once the configured number of consecutive failures
//! is reached. A refused claim is final for that job: its commands are never
//! run, the poller goes back to pinging and never claims that job id again.

use anyhow::Result;
use parking_lot::Mutex;
use reef_client::ClientError;
use reef_core::domain::agent::AgentIdentity;
use reef_core::domain::job::Job;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::config::Config;
use crate::repository::JobRepository;
use crate::service::JobRunner;

/// Result of one ping
#[derive(Debug)]
pub enum PollOutcome {
    /// The server has nothing for this agent yet
    NoJob,
    /// A job is assigned
    Found(Job),
    /// The server could not be reached or its answer could not be read
    TransportError(ClientError),
}

/// Result of one claim attempt
#[derive(Debug)]
pub enum ClaimOutcome {
    Claimed,
    /// The server refused; another agent got the job
    Rejected,
    /// The claim request itself failed
    Failed(ClientError),
}

/// Job poller that waits for, claims and executes jobs
pub struct JobPoller {
    config: Config,
    identity: AgentIdentity,
    jobs: Arc<dyn JobRepository>,
    runner: JobRunner,
    /// Jobs whose claim failed; offered again, they count as "no job"
    abandoned: Mutex<HashSet<String>>,
}

impl JobPoller {
    /// Creates a new job poller
    pub fn new(config: Config, jobs: Arc<dyn JobRepository>, runner: JobRunner) -> Self {
        let identity = config.identity();
        Self {
            config,
            identity,
            jobs,
            runner,
            abandoned: Mutex::new(HashSet::new()),
        }
    }

    /// Polls, claims and runs jobs
    ///
    /// Returns after the first executed job unless `keep_running` is set.
    /// Fails only when the queue server stays unreachable for
    /// `max_transport_failures` consecutive pings.
    ///
    /// # Returns
    /// The number of jobs executed
    pub async fn run(&self) -> Result<usize> {
        info!(
            "Starting job poller for {} (interval: {:?})",
            self.identity, self.config.poll_interval
        );

        let mut executed = 0;

        loop {
            let job = self.wait_for_job().await?;

            if self.abandoned.lock().contains(&job.id) {
                debug!("Job {} was already abandoned, ignoring it", job.id);
                time::sleep(self.config.poll_interval).await;
                continue;
            }

            match self.claim(&job).await {
                ClaimOutcome::Claimed => {}
                ClaimOutcome::Rejected => {
                    warn!("Job {} was claimed by another agent, skipping it", job.id);
                    self.abandoned.lock().insert(job.id);
                    time::sleep(self.config.poll_interval).await;
                    continue;
                }
                ClaimOutcome::Failed(e) => {
                    warn!("Failed to claim job {}: {}", job.id, e);
                    self.abandoned.lock().insert(job.id);
                    time::sleep(self.config.poll_interval).await;
                    continue;
                }
            }

            info!("Claimed job {} ({} command(s))", job.id, job.commands.len());

            match self.runner.run(&job).await {
                Ok(report) => {
                    executed += 1;
                    info!(
                        "Job {} completed with status: {} ({} log chunk(s), {} upload failure(s))",
                        job.id,
                        if report.result.success() {
                            "success"
                        } else {
                            "failure"
                        },
                        report.logs.chunk_count(),
                        report.logs.upload_failures()
                    );
                }
                Err(e) => {
                    error!("Failed to execute job {}: {:#}", job.id, e);
                }
            }

            if !self.config.keep_running {
                return Ok(executed);
            }
            time::sleep(self.config.poll_interval).await;
        }
    }

    /// Pings until a job is assigned
    async fn wait_for_job(&self) -> Result<Job> {
        let mut backoff = Backoff::new(
            self.config.transport_backoff_initial,
            self.config.transport_backoff_max,
        );
        let mut consecutive_failures: u32 = 0;

        loop {
            match self.poll_once().await {
                PollOutcome::Found(job) => return Ok(job),
                PollOutcome::NoJob => {
                    debug!("No job available");
                    consecutive_failures = 0;
                    backoff.reset();
                    time::sleep(self.config.poll_interval).await;
                }
                PollOutcome::TransportError(e) => {
                    consecutive_failures += 1;
                    let limit = self.config.max_transport_failures;
                    if limit > 0 && consecutive_failures >= limit {
                        error!(
                            "Queue server at {} unreachable after {} attempts",
                            self.config.queue_url, consecutive_failures
                        );
                        return Err(anyhow::anyhow!(
                            "Giving up on queue server after {} consecutive failures: {}",
                            consecutive_failures,
                            e
                        ));
                    }

                    let delay = backoff.next_delay();
                    warn!(
                        "Failed to reach queue server (attempt {}): {}; retrying in {:?}",
                        consecutive_failures, e, delay
                    );
                    time::sleep(delay).await;
                }
            }
        }
    }

    /// Performs a single ping
    pub async fn poll_once(&self) -> PollOutcome {
        match self.jobs.ping(&self.identity).await {
            Ok(Some(job)) => PollOutcome::Found(job),
            Ok(None) => PollOutcome::NoJob,
            Err(e) => PollOutcome::TransportError(e),
        }
    }

    /// Tries once to claim `job` for this agent
    pub async fn claim(&self, job: &Job) -> ClaimOutcome {
        match self.jobs.acquire_job(&job.id, &self.identity.id).await {
            Ok(true) => ClaimOutcome::Claimed,
            Ok(false) => ClaimOutcome::Rejected,
            Err(e) => ClaimOutcome::Failed(e),
        }
    }
}

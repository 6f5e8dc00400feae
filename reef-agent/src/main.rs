//! Reef Agent
//!
//! A CI job-execution agent. It polls a job queue, claims a job, runs the
//! job's commands and streams their output back to the log service while
//! keeping a local copy of every chunk.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Repositories: Trait seams over the queue server and log service clients
//! - Services: Output buffering, chunking, log pipeline, command execution
//! - Scheduler: Polling, claiming and job lifecycle

mod backoff;
mod config;
mod repository;
mod scheduler;
mod service;

#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::repository::LogRepository;
use crate::scheduler::JobPoller;
use crate::service::{ExecutionService, JobRunner, StandardExecutionService};
use reef_client::{LogServiceClient, QueueClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reef_agent=info,reef_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting Reef Agent");

    // Load configuration
    let config = load_config()?;
    info!(
        "Loaded configuration: agent_id={}, queue={}, queue_url={}, log_service_url={}",
        config.agent_id, config.queue, config.queue_url, config.log_service_url
    );

    // Initialize clients
    let queue_client = Arc::new(QueueClient::new(config.queue_url.clone()));
    let log_client: Arc<dyn LogRepository> = match config.upload_timeout {
        Some(timeout) => Arc::new(
            LogServiceClient::with_timeout(config.log_service_url.clone(), timeout)
                .context("Failed to build log service client")?,
        ),
        None => Arc::new(LogServiceClient::new(config.log_service_url.clone())),
    };

    info!("Clients initialized");

    // Initialize services
    let execution_service: Arc<dyn ExecutionService> =
        Arc::new(StandardExecutionService::new(config.execution_config()));
    let runner = JobRunner::new(execution_service, log_client, config.pipeline_config());

    info!(
        "Poll interval: {:?}, Log drain interval: {:?}, Logs dir: {}",
        config.poll_interval,
        config.log_drain_interval,
        config.logs_dir.display()
    );

    // Create job poller
    let poller = JobPoller::new(config, queue_client, runner);

    match poller.run().await {
        Ok(executed) => {
            info!("Agent finished after executing {} job(s)", executed);
            Ok(())
        }
        Err(e) => {
            error!("Poller error: {:#}", e);
            Err(e)
        }
    }
}

/// Loads configuration from environment variables and validates it
fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

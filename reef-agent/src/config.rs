//! Agent configuration
//!
//! Defines all configurable parameters for the agent including polling
//! cadence, log pipeline tuning, upload retry policy and the addresses of the
//! queue server and log service.

use anyhow::{Context, Result};
use reef_core::domain::agent::AgentIdentity;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::service::{CommandFailurePolicy, ExecutionConfig, PipelineConfig, UploadPolicy};

/// Default maximum chunk size, 10 MiB
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Agent configuration
///
/// All intervals are configurable so tests and slow networks can tune them.
#[derive(Debug, Clone)]
pub struct Config {
    /// Unique identifier for this agent instance
    pub agent_id: String,

    /// Queue this agent pulls jobs from
    pub queue: String,

    /// Queue server base URL (e.g., "http://localhost:1235")
    pub queue_url: String,

    /// Log-ingestion service host
    pub log_service_url: String,

    /// Directory receiving the local copy of every chunk
    pub logs_dir: PathBuf,

    /// How long to wait between pings while no job is available
    pub poll_interval: Duration,

    /// How often the log pipeline drains the output buffer
    pub log_drain_interval: Duration,

    /// Largest chunk the pipeline will emit, in bytes
    pub max_chunk_size: usize,

    /// Capacity of the bounded chunk queue between drain and upload
    pub chunk_queue_capacity: usize,

    /// First delay after a transport failure talking to the queue server
    pub transport_backoff_initial: Duration,

    /// Cap for the doubling transport backoff
    pub transport_backoff_max: Duration,

    /// Consecutive transport failures tolerated before giving up (0 = never)
    pub max_transport_failures: u32,

    /// Attempts per chunk upload, including the first one
    pub upload_max_attempts: u32,

    /// Initial delay between upload attempts, doubled after each failure
    pub upload_backoff: Duration,

    /// Per-request timeout for chunk uploads
    pub upload_timeout: Option<Duration>,

    /// Abort the remaining commands of a job after one fails
    pub fail_fast: bool,

    /// Shell used to interpret commands (`<shell> -c <command>`)
    pub command_shell: Option<String>,

    /// Echo job output to the agent's stdout
    pub echo_output: bool,

    /// Keep polling for more work after a job completes
    pub keep_running: bool,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(agent_id: String, queue_url: String) -> Self {
        Self {
            agent_id,
            queue: "default".to_string(),
            log_service_url: queue_url.clone(),
            queue_url,
            logs_dir: PathBuf::from("logs"),
            poll_interval: Duration::from_secs(1),
            log_drain_interval: Duration::from_secs(1),
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            chunk_queue_capacity: 100,
            transport_backoff_initial: Duration::from_secs(1),
            transport_backoff_max: Duration::from_secs(30),
            max_transport_failures: 10,
            upload_max_attempts: 3,
            upload_backoff: Duration::from_millis(500),
            upload_timeout: Some(Duration::from_secs(30)),
            fail_fast: false,
            command_shell: None,
            echo_output: true,
            keep_running: false,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Every variable is optional:
    /// - AGENT_ID (default: random UUID)
    /// - AGENT_QUEUE (default: "default")
    /// - QUEUE_URL (default: http://localhost:1235)
    /// - LOG_SERVICE_URL (default: QUEUE_URL)
    /// - LOGS_DIR (default: logs)
    /// - POLL_INTERVAL_MS, LOG_DRAIN_INTERVAL_MS (default: 1000)
    /// - MAX_CHUNK_SIZE (bytes, default: 10 MiB)
    /// - CHUNK_QUEUE_CAPACITY (default: 100)
    /// - TRANSPORT_BACKOFF_INITIAL_MS / TRANSPORT_BACKOFF_MAX_MS (default: 1000 / 30000)
    /// - MAX_TRANSPORT_FAILURES (default: 10, 0 = unlimited)
    /// - UPLOAD_MAX_ATTEMPTS (default: 3), UPLOAD_BACKOFF_MS (default: 500)
    /// - UPLOAD_TIMEOUT_MS (default: 30000, 0 = no timeout)
    /// - FAIL_FAST, ECHO_OUTPUT, KEEP_RUNNING (booleans)
    /// - COMMAND_SHELL (e.g. "sh")
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let agent_id = lookup("AGENT_ID").unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let queue_url = lookup("QUEUE_URL").unwrap_or_else(|| "http://localhost:1235".to_string());

        let mut config = Self::new(agent_id, queue_url);

        if let Some(queue) = lookup("AGENT_QUEUE") {
            config.queue = queue;
        }
        if let Some(url) = lookup("LOG_SERVICE_URL") {
            config.log_service_url = url;
        }
        if let Some(dir) = lookup("LOGS_DIR") {
            config.logs_dir = PathBuf::from(dir);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "POLL_INTERVAL_MS")? {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "LOG_DRAIN_INTERVAL_MS")? {
            config.log_drain_interval = Duration::from_millis(ms);
        }
        if let Some(size) = parse_var(&lookup, "MAX_CHUNK_SIZE")? {
            config.max_chunk_size = size;
        }
        if let Some(capacity) = parse_var(&lookup, "CHUNK_QUEUE_CAPACITY")? {
            config.chunk_queue_capacity = capacity;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "TRANSPORT_BACKOFF_INITIAL_MS")? {
            config.transport_backoff_initial = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "TRANSPORT_BACKOFF_MAX_MS")? {
            config.transport_backoff_max = Duration::from_millis(ms);
        }
        if let Some(limit) = parse_var(&lookup, "MAX_TRANSPORT_FAILURES")? {
            config.max_transport_failures = limit;
        }
        if let Some(attempts) = parse_var(&lookup, "UPLOAD_MAX_ATTEMPTS")? {
            config.upload_max_attempts = attempts;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "UPLOAD_BACKOFF_MS")? {
            config.upload_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "UPLOAD_TIMEOUT_MS")? {
            config.upload_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(flag) = parse_bool(&lookup, "FAIL_FAST")? {
            config.fail_fast = flag;
        }
        if let Some(flag) = parse_bool(&lookup, "ECHO_OUTPUT")? {
            config.echo_output = flag;
        }
        if let Some(flag) = parse_bool(&lookup, "KEEP_RUNNING")? {
            config.keep_running = flag;
        }
        config.command_shell = lookup("COMMAND_SHELL").filter(|s| !s.trim().is_empty());

        Ok(config)
    }

    /// Identity presented to the queue server
    pub fn identity(&self) -> AgentIdentity {
        AgentIdentity::new(self.agent_id.clone(), self.queue.clone())
    }

    /// Settings for each job's log pipeline
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            drain_interval: self.log_drain_interval,
            max_chunk_size: self.max_chunk_size,
            queue_capacity: self.chunk_queue_capacity,
            logs_dir: self.logs_dir.clone(),
            upload_policy: UploadPolicy {
                max_attempts: self.upload_max_attempts,
                initial_backoff: self.upload_backoff,
            },
        }
    }

    /// Settings for running a job's commands
    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            failure_policy: if self.fail_fast {
                CommandFailurePolicy::FailFast
            } else {
                CommandFailurePolicy::Continue
            },
            shell: self.command_shell.clone(),
            echo_output: self.echo_output,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.agent_id.is_empty() {
            anyhow::bail!("agent_id cannot be empty");
        }

        if self.queue.is_empty() {
            anyhow::bail!("queue cannot be empty");
        }

        for (name, url) in [
            ("queue_url", &self.queue_url),
            ("log_service_url", &self.log_service_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.log_drain_interval.is_zero() {
            anyhow::bail!("log_drain_interval must be greater than 0");
        }

        if self.max_chunk_size == 0 {
            anyhow::bail!("max_chunk_size must be greater than 0");
        }

        if self.chunk_queue_capacity == 0 {
            anyhow::bail!("chunk_queue_capacity must be greater than 0");
        }

        if self.upload_max_attempts == 0 {
            anyhow::bail!("upload_max_attempts must be at least 1");
        }

        if self.transport_backoff_initial > self.transport_backoff_max {
            anyhow::bail!("transport_backoff_initial cannot exceed transport_backoff_max");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            "http://localhost:1235".to_string(),
        )
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {}: {:?}", name, raw))
        })
        .transpose()
}

fn parse_bool<F>(lookup: &F, name: &str) -> Result<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("Invalid value for {}: {:?}", name, raw),
        })
        .transpose()
}

//! Execution service
//!
//! Runs a job's commands in order as separate processes. Standard output and
//! standard error of every command are appended to the job's log buffer as
//! they arrive. A failing command is reported inline in the output and, under
//! the default policy, does not stop the remaining commands.

use async_trait::async_trait;
use reef_core::domain::job::{CommandOutcome, CommandStatus, Job, JobResult};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, Stdout};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::service::log_buffer::LogBufferService;

/// Prefix for diagnostics the agent writes into job output
const DIAGNOSTIC_PREFIX: &str = "reef-agent:";

/// What to do with the remaining commands after one fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandFailurePolicy {
    /// Run every command regardless of earlier failures
    #[default]
    Continue,
    /// Skip the remaining commands after the first failure
    FailFast,
}

/// Settings for command execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionConfig {
    pub failure_policy: CommandFailurePolicy,
    /// Shell used as `<shell> -c <command>`; commands are split on
    /// whitespace and run directly when unset
    pub shell: Option<String>,
    /// Also copy job output to the agent's stdout
    pub echo_output: bool,
}

/// Service trait for executing a job's commands
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Executes every command of `job`, writing their output to `log_buffer`
    ///
    /// # Returns
    /// The per-command outcomes
    async fn execute_job(&self, job: &Job, log_buffer: Arc<dyn LogBufferService>) -> JobResult;
}

/// Standard implementation of ExecutionService using local processes
pub struct StandardExecutionService {
    config: ExecutionConfig,
}

impl StandardExecutionService {
    /// Creates a new standard execution service
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    /// Builds the process for one command line
    fn build_command(&self, command_line: &str) -> Result<Command, String> {
        let mut command = match &self.config.shell {
            Some(shell) => {
                let mut command = Command::new(shell);
                command.arg("-c").arg(command_line);
                command
            }
            None => {
                let mut parts = command_line.split_whitespace();
                let program = parts.next().ok_or_else(|| "empty command".to_string())?;
                let mut command = Command::new(program);
                command.args(parts);
                command
            }
        };

        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(command)
    }

    /// Runs a single command to completion
    async fn run_command(&self, command_line: &str, output: &OutputSink) -> CommandStatus {
        let mut command = match self.build_command(command_line) {
            Ok(command) => command,
            Err(reason) => return CommandStatus::NotStarted { reason },
        };

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return CommandStatus::NotStarted {
                    reason: e.to_string(),
                };
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (_, _, status) = tokio::join!(
            pump(stdout, output),
            pump(stderr, output),
            child.wait()
        );

        match status {
            Ok(status) if status.success() => CommandStatus::Succeeded,
            Ok(status) => CommandStatus::Failed {
                exit_code: status.code(),
            },
            Err(e) => CommandStatus::NotStarted {
                reason: format!("failed to wait for process: {}", e),
            },
        }
    }
}

#[async_trait]
impl ExecutionService for StandardExecutionService {
    async fn execute_job(&self, job: &Job, log_buffer: Arc<dyn LogBufferService>) -> JobResult {
        info!(
            "Starting execution of job {} ({} command(s))",
            job.id,
            job.commands.len()
        );

        let output = OutputSink::new(log_buffer, self.config.echo_output);
        let mut outcomes = Vec::with_capacity(job.commands.len());
        let mut failed = false;

        for (idx, command_line) in job.commands.iter().enumerate() {
            if failed && self.config.failure_policy == CommandFailurePolicy::FailFast {
                output
                    .diagnostic(&format!(
                        "skipping `{}` after an earlier failure",
                        command_line
                    ))
                    .await;
                outcomes.push(CommandOutcome {
                    command: command_line.clone(),
                    status: CommandStatus::Skipped,
                });
                continue;
            }

            debug!(
                "Job {} command {}/{}: {}",
                job.id,
                idx + 1,
                job.commands.len(),
                command_line
            );

            let status = self.run_command(command_line, &output).await;
            match &status {
                CommandStatus::Succeeded => {}
                CommandStatus::Failed { exit_code } => {
                    failed = true;
                    let exit = exit_code
                        .map(|code| format!("exit code {}", code))
                        .unwrap_or_else(|| "a signal".to_string());
                    warn!("Job {} command `{}` failed with {}", job.id, command_line, exit);
                    output
                        .diagnostic(&format!("command `{}` failed with {}", command_line, exit))
                        .await;
                }
                CommandStatus::NotStarted { reason } => {
                    failed = true;
                    warn!(
                        "Job {} command `{}` could not be started: {}",
                        job.id, command_line, reason
                    );
                    output
                        .diagnostic(&format!(
                            "failed to start `{}`: {}",
                            command_line, reason
                        ))
                        .await;
                }
                CommandStatus::Skipped => {}
            }

            outcomes.push(CommandOutcome {
                command: command_line.clone(),
                status,
            });
        }

        let result = JobResult {
            job_id: job.id.clone(),
            commands: outcomes,
        };
        info!(
            "Job {} finished: {} of {} command(s) failed",
            job.id,
            result.failed_count(),
            result.commands.len()
        );
        result
    }
}

/// Where command output goes: the job buffer, optionally teed to stdout
///
/// Echoing stops after the first failed write to stdout; the buffer always
/// receives everything.
struct OutputSink {
    buffer: Arc<dyn LogBufferService>,
    echo: Option<Mutex<Stdout>>,
    echo_failed: AtomicBool,
}

impl OutputSink {
    fn new(buffer: Arc<dyn LogBufferService>, echo: bool) -> Self {
        Self {
            buffer,
            echo: echo.then(|| Mutex::new(tokio::io::stdout())),
            echo_failed: AtomicBool::new(false),
        }
    }

    async fn write(&self, data: &[u8]) {
        self.buffer.append(data);

        let Some(stdout) = &self.echo else {
            return;
        };
        if self.echo_failed.load(Ordering::Relaxed) {
            return;
        }

        let mut stdout = stdout.lock().await;
        let result = match stdout.write_all(data).await {
            Ok(()) => stdout.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            if !self.echo_failed.swap(true, Ordering::Relaxed) {
                debug!("Failed to echo command output, echo disabled: {}", e);
            }
        }
    }

    async fn diagnostic(&self, message: &str) {
        self.write(format!("{} {}\n", DIAGNOSTIC_PREFIX, message).as_bytes())
            .await;
    }
}

/// Copies a process stream into the sink until EOF
async fn pump<R>(reader: Option<R>, output: &OutputSink)
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return;
    };

    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => output.write(&buf[..n]).await,
            Err(e) => {
                warn!("Failed to read command output: {}", e);
                break;
            }
        }
    }
}

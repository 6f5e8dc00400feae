//! Job domain types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A unit of work assigned by the queue server
///
/// Owned read-only by the agent once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub commands: Vec<String>,
}

impl Job {
    pub fn new(id: impl Into<String>, commands: Vec<String>) -> Self {
        Self {
            id: id.into(),
            commands,
        }
    }
}

/// A job id that cannot be used to name local files
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid job id {id:?}: {reason}")]
pub struct InvalidJobId {
    pub id: String,
    pub reason: &'static str,
}

/// Checks that `id` is usable as a single path component
///
/// Job ids end up in local file names (`{job_id}-{sequence}.log`), so an id
/// must be non-empty, must not be `.` or `..` and must not contain path
/// separators or NUL bytes.
pub fn validate_job_id(id: &str) -> Result<(), InvalidJobId> {
    let reason = if id.is_empty() {
        "empty"
    } else if id == "." || id == ".." {
        "relative path component"
    } else if id.contains(['/', '\\']) {
        "contains a path separator"
    } else if id.contains('\0') {
        "contains a NUL byte"
    } else {
        return Ok(());
    };

    Err(InvalidJobId {
        id: id.to_string(),
        reason,
    })
}

/// How a single command ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandStatus {
    /// Exited with status zero
    Succeeded,
    /// Exited with a non-zero status, or was terminated by a signal (`None`)
    Failed { exit_code: Option<i32> },
    /// Could not be launched at all
    NotStarted { reason: String },
    /// Never attempted because an earlier command failed in fail-fast mode
    Skipped,
}

/// Outcome of one command of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub command: String,
    pub status: CommandStatus,
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, CommandStatus::Succeeded)
    }
}

/// Aggregate result of a job execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: String,
    pub commands: Vec<CommandOutcome>,
}

impl JobResult {
    /// True when every command ran and exited zero
    pub fn success(&self) -> bool {
        self.commands.iter().all(CommandOutcome::is_success)
    }

    /// Number of commands that did not succeed (skipped ones included)
    pub fn failed_count(&self) -> usize {
        self.commands.iter().filter(|c| !c.is_success()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(command: &str, status: CommandStatus) -> CommandOutcome {
        CommandOutcome {
            command: command.to_string(),
            status,
        }
    }

    #[test]
    fn test_job_result_success_requires_all_commands() {
        let result = JobResult {
            job_id: "J1".to_string(),
            commands: vec![
                outcome("echo hi", CommandStatus::Succeeded),
                outcome("false", CommandStatus::Failed { exit_code: Some(1) }),
            ],
        };
        assert!(!result.success());
        assert_eq!(result.failed_count(), 1);
    }

    #[test]
    fn test_empty_job_result_is_success() {
        let result = JobResult {
            job_id: "J1".to_string(),
            commands: Vec::new(),
        };
        assert!(result.success());
        assert_eq!(result.failed_count(), 0);
    }

    #[test]
    fn test_validate_job_id_accepts_plain_ids() {
        assert!(validate_job_id("J1").is_ok());
        assert!(validate_job_id("build-42.linux").is_ok());
        assert!(validate_job_id("..hidden").is_ok());
    }

    #[test]
    fn test_validate_job_id_rejects_path_like_ids() {
        for id in ["", ".", "..", "../escaped", "a/b", "a\\b", "nul\0byte"] {
            let err = validate_job_id(id).unwrap_err();
            assert_eq!(err.id, id);
        }
    }
}

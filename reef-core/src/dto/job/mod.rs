//! Job DTOs for the queue server contract

use serde::{Deserialize, Serialize};

use crate::domain::job::{InvalidJobId, Job, validate_job_id};

/// Body of a successful `GET /ping` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    pub job_id: String,
    #[serde(default)]
    pub commands: Vec<String>,
}

impl TryFrom<PingResponse> for Job {
    type Error = InvalidJobId;

    fn try_from(response: PingResponse) -> Result<Self, Self::Error> {
        validate_job_id(&response.job_id)?;
        Ok(Job {
            id: response.job_id,
            commands: response.commands,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_response_decodes_camel_case() {
        let body = r#"{"jobId":"J1","commands":["echo hi","false"]}"#;
        let response: PingResponse = serde_json::from_str(body).unwrap();
        let job = Job::try_from(response).unwrap();
        assert_eq!(job.id, "J1");
        assert_eq!(job.commands, vec!["echo hi".to_string(), "false".to_string()]);
    }

    #[test]
    fn test_ping_response_without_commands() {
        let response: PingResponse = serde_json::from_str(r#"{"jobId":"J2"}"#).unwrap();
        assert!(response.commands.is_empty());
    }

    #[test]
    fn test_ping_response_requires_job_id() {
        let result = serde_json::from_str::<PingResponse>(r#"{"commands":[]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_ping_response_with_path_like_job_id_is_rejected() {
        let response: PingResponse =
            serde_json::from_str(r#"{"jobId":"../escaped","commands":["echo hi"]}"#).unwrap();
        let err = Job::try_from(response).unwrap_err();
        assert_eq!(err.id, "../escaped");
    }
}

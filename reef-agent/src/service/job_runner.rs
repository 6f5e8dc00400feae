//! Job runner
//!
//! Ties command execution to the log pipeline for one job: the pipeline is
//! started before the first command runs and stopped after the last one
//! finishes, so every byte of output is flushed before the job is reported.

use anyhow::{Context, Result};
use reef_core::domain::job::{Job, JobResult};
use std::sync::Arc;

use crate::repository::LogRepository;
use crate::service::execution::ExecutionService;
use crate::service::log_buffer::{InMemoryLogBuffer, LogBufferService};
use crate::service::log_pipeline::{LogPipeline, PipelineConfig, PipelineReport};

/// Everything known about a finished job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub result: JobResult,
    pub logs: PipelineReport,
}

/// Runs claimed jobs
pub struct JobRunner {
    execution: Arc<dyn ExecutionService>,
    uploader: Arc<dyn LogRepository>,
    pipeline_config: PipelineConfig,
}

impl JobRunner {
    pub fn new(
        execution: Arc<dyn ExecutionService>,
        uploader: Arc<dyn LogRepository>,
        pipeline_config: PipelineConfig,
    ) -> Self {
        Self {
            execution,
            uploader,
            pipeline_config,
        }
    }

    /// Executes a job with its own buffer and log pipeline
    pub async fn run(&self, job: &Job) -> Result<JobReport> {
        let buffer: Arc<dyn LogBufferService> = Arc::new(InMemoryLogBuffer::new());
        let mut pipeline = LogPipeline::new(
            job.id.clone(),
            self.pipeline_config.clone(),
            Arc::clone(&buffer),
            Arc::clone(&self.uploader),
        );

        pipeline
            .start()
            .await
            .with_context(|| format!("Failed to start log pipeline for job {}", job.id))?;

        let result = self.execution.execute_job(job, buffer).await;

        let logs = pipeline
            .stop()
            .await
            .with_context(|| format!("Failed to stop log pipeline for job {}", job.id))?;

        Ok(JobReport { result, logs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::execution::{ExecutionConfig, StandardExecutionService};
    use crate::service::log_pipeline::UploadPolicy;
    use crate::test_support::RecordingLogRepository;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_streams_all_output() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = Arc::new(RecordingLogRepository::new());
        let runner = JobRunner::new(
            Arc::new(StandardExecutionService::new(ExecutionConfig::default())),
            uploader.clone(),
            PipelineConfig {
                drain_interval: Duration::from_millis(20),
                max_chunk_size: 1024,
                queue_capacity: 8,
                logs_dir: dir.path().to_path_buf(),
                upload_policy: UploadPolicy::no_retry(),
            },
        );

        let job = Job::new("J9", vec!["echo one".to_string(), "echo two".to_string()]);
        let report = runner.run(&job).await.unwrap();

        assert!(report.result.success());
        let joined: Vec<u8> = uploader
            .chunks()
            .into_iter()
            .flat_map(|c| c.data)
            .collect();
        assert_eq!(joined, b"one\ntwo\n");
        assert_eq!(report.logs.total_bytes(), joined.len());
    }
}

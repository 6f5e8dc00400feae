//! Service layer
//!
//! Services contain the agent's job-side logic: buffering command output,
//! chunking it, persisting and uploading chunks, and running commands.
//!
//! Services with more than one plausible implementation are trait-based to
//! enable testing and dependency injection.

mod chunk_store;
mod chunker;
mod execution;
mod job_runner;
mod log_buffer;
mod log_pipeline;

// Re-export traits
pub use execution::ExecutionService;

// Re-export implementations
pub use execution::{CommandFailurePolicy, ExecutionConfig, StandardExecutionService};
pub use job_runner::JobRunner;
pub use log_pipeline::{PipelineConfig, UploadPolicy};

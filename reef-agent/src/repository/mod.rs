//! Repository layer
//!
//! Repositories abstract communication with the queue server and the log
//! service. They are thin trait seams over `reef-client` so the scheduler and
//! log pipeline can be exercised against in-memory fakes.

mod jobs;
mod logs;

// Re-export traits
pub use jobs::JobRepository;
pub use logs::LogRepository;

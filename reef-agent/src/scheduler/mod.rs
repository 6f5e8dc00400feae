//! Scheduler layer for the agent
//!
//! This layer polls the queue server for work, claims a job exclusively and
//! hands it to the job runner. It manages the lifecycle of jobs from
//! discovery to completion.

pub mod poller;

pub use poller::JobPoller;

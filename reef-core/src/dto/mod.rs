//! Data Transfer Objects
//!
//! Wire shapes exchanged with the job-queue server.

pub mod job;

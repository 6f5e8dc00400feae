//! Core domain types
//!
//! This module contains the domain structures shared between the HTTP client
//! and the agent. The agent owns execution; the queue server owns scheduling.

pub mod agent;
pub mod job;
pub mod log;

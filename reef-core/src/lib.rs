//! Reef Core
//!
//! Core types and abstractions for the Reef CI agent.
//!
//! This crate contains:
//! - Domain types: Core entities (AgentIdentity, Job, LogChunk, etc.)
//! - DTOs: Wire shapes exchanged with the job-queue server

pub mod domain;
pub mod dto;

//! Agent identity

use serde::{Deserialize, Serialize};

/// Identity an agent presents to the queue server
///
/// Fixed for the lifetime of the agent process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    /// Unique identifier for this agent
    pub id: String,

    /// Name of the queue the agent pulls jobs from
    pub queue: String,
}

impl AgentIdentity {
    pub fn new(id: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            queue: queue.into(),
        }
    }
}

impl std::fmt::Display for AgentIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.queue)
    }
}

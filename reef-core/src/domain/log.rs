//! Log domain types

use serde::{Deserialize, Serialize};

/// A sequence-numbered slice of a job's output
///
/// Sequence numbers start at 0 for each job and are assigned exactly once,
/// in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogChunk {
    pub job_id: String,
    pub sequence: u64,
    pub data: Vec<u8>,
}

impl LogChunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// File name of the local copy of this chunk, `{job_id}-{sequence}.log`
    pub fn file_name(&self) -> String {
        format!("{}-{}.log", self.job_id, self.sequence)
    }
}

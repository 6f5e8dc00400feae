//! Log buffer service
//!
//! Accumulates a job's raw output between drains.
//! Command output is appended from the execution task while the log
//! pipeline's drain worker periodically takes everything accumulated so far;
//! every access goes through one mutex so the two never interleave.

use parking_lot::Mutex;
use std::sync::Arc;

/// Service for managing a job's output buffer
pub trait LogBufferService: Send + Sync {
    /// Appends bytes to the end of the buffer
    fn append(&self, data: &[u8]);

    /// Takes every buffered byte and leaves the buffer empty
    ///
    /// This is the single "read-and-clear" step; no byte can be appended
    /// between the read and the clear.
    fn drain(&self) -> Vec<u8>;

    /// Number of bytes currently buffered
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory implementation of LogBufferService
///
/// Cloning yields another handle to the same buffer.
#[derive(Clone, Default)]
pub struct InMemoryLogBuffer {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl InMemoryLogBuffer {
    /// Creates a new, empty log buffer
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogBufferService for InMemoryLogBuffer {
    fn append(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.buffer.lock().extend_from_slice(data);
    }

    fn drain(&self) -> Vec<u8> {
        std::mem::take(&mut *self.buffer.lock())
    }

    fn len(&self) -> usize {
        self.buffer.lock().len()
    }
}

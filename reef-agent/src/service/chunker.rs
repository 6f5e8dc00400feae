//! Chunking of drained log output
//!
//! Splits drained bytes into consecutive slices of at most `max_chunk_size`
//! bytes and stamps each with the job's next sequence number.

use reef_core::domain::log::LogChunk;

/// Turns drained bytes into sequence-numbered chunks for one job
///
/// Sequence numbers start at 0 and are handed out once each, in order, for
/// the lifetime of the chunker.
#[derive(Debug)]
pub struct Chunker {
    job_id: String,
    max_chunk_size: usize,
    next_sequence: u64,
}

impl Chunker {
    pub fn new(job_id: impl Into<String>, max_chunk_size: usize) -> Self {
        Self {
            job_id: job_id.into(),
            max_chunk_size: max_chunk_size.max(1),
            next_sequence: 0,
        }
    }

    /// Sequence number the next chunk will receive
    ///
    /// Equal to the number of chunks produced so far.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Splits `data` into chunks
    ///
    /// Empty input yields no chunks. Input no larger than the maximum is moved
    /// into a single chunk without copying.
    pub fn chunk(&mut self, data: Vec<u8>) -> Vec<LogChunk> {
        if data.is_empty() {
            return Vec::new();
        }

        if data.len() <= self.max_chunk_size {
            return vec![self.make_chunk(data)];
        }

        let slices: Vec<Vec<u8>> = data
            .chunks(self.max_chunk_size)
            .map(<[u8]>::to_vec)
            .collect();
        slices
            .into_iter()
            .map(|slice| self.make_chunk(slice))
            .collect()
    }

    fn make_chunk(&mut self, data: Vec<u8>) -> LogChunk {
        let chunk = LogChunk {
            job_id: self.job_id.clone(),
            sequence: self.next_sequence,
            data,
        };
        self.next_sequence += 1;
        chunk
    }
}

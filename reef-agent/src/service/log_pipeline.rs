//! Log pipeline
//!
//! Streams a job's output from its [`LogBufferService`] to local files and
//! the log service while the job runs.
//!
//! Two workers run per job:
//! - the drain worker empties the buffer every `drain_interval`, chunks the
//!   bytes and pushes the chunks onto a bounded queue
//! - the upload worker pops chunks in order, persists each one locally and
//!   then uploads it
//!
//! The queue is bounded, so a slow upload worker holds the drain worker back
//! instead of letting memory grow; chunk order is unaffected.
//!
//! [`LogPipeline::stop`] drains the buffer one last time, cancels both
//! workers, waits for them and only then closes the queue.

use anyhow::Result;
use reef_core::domain::log::LogChunk;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::repository::LogRepository;
use crate::service::chunk_store::LocalChunkStore;
use crate::service::chunker::Chunker;
use crate::service::log_buffer::LogBufferService;

/// Upper bound for the delay between two upload attempts
const MAX_UPLOAD_BACKOFF: Duration = Duration::from_secs(10);

/// Settings for a job's log pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Period of the drain worker
    pub drain_interval: Duration,
    /// Largest chunk emitted, in bytes
    pub max_chunk_size: usize,
    /// Capacity of the chunk queue
    pub queue_capacity: usize,
    /// Directory for local chunk files
    pub logs_dir: PathBuf,
    /// What to do when an upload fails
    pub upload_policy: UploadPolicy,
}

/// Bounded retry policy for chunk uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Attempts per chunk, the first one included
    pub max_attempts: u32,
    /// Delay after the first failed attempt, doubled after each further one
    pub initial_backoff: Duration,
}

impl UploadPolicy {
    /// A single attempt; failed chunks are dropped from the remote copy
    #[cfg(test)]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }
}

/// Result of uploading one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded { attempts: u32 },
    Failed { attempts: u32, error: String },
}

/// Result of persisting one chunk locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Written(PathBuf),
    Failed(String),
}

/// What happened to one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReceipt {
    pub sequence: u64,
    pub bytes: usize,
    pub persist: PersistOutcome,
    pub upload: UploadOutcome,
}

/// Summary returned by [`LogPipeline::stop`]
///
/// Receipts are in the order the upload worker handled the chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub receipts: Vec<ChunkReceipt>,
}

impl PipelineReport {
    pub fn chunk_count(&self) -> usize {
        self.receipts.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.receipts.iter().map(|r| r.bytes).sum()
    }

    pub fn uploaded(&self) -> usize {
        self.receipts
            .iter()
            .filter(|r| matches!(r.upload, UploadOutcome::Uploaded { .. }))
            .count()
    }

    pub fn upload_failures(&self) -> usize {
        self.chunk_count() - self.uploaded()
    }

    pub fn persist_failures(&self) -> usize {
        self.receipts
            .iter()
            .filter(|r| matches!(r.persist, PersistOutcome::Failed(_)))
            .count()
    }
}

/// Lifecycle of a [`LogPipeline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Stopped,
    Active,
    Draining,
}

/// Producer side of the chunk queue
///
/// Shared by the drain worker and `stop`; holding its lock across a drain and
/// the matching enqueues keeps sequence order identical to queue order.
struct ChunkProducer {
    chunker: Chunker,
    queue: Option<mpsc::Sender<LogChunk>>,
}

impl ChunkProducer {
    /// Drains the buffer and enqueues the resulting chunks
    ///
    /// Waits for queue space when the queue is full. Returns the number of
    /// chunks enqueued.
    async fn drain_and_enqueue(&mut self, buffer: &dyn LogBufferService) -> usize {
        let data = buffer.drain();
        if data.is_empty() {
            return 0;
        }

        let chunks = self.chunker.chunk(data);
        let Some(queue) = self.queue.as_ref() else {
            error!(
                "Chunk queue already closed, dropping {} chunk(s)",
                chunks.len()
            );
            return 0;
        };

        let mut enqueued = 0;
        for chunk in chunks {
            if let Err(mpsc::error::SendError(chunk)) = queue.send(chunk).await {
                error!(
                    "Upload worker is gone, dropping chunk {} of job {}",
                    chunk.sequence, chunk.job_id
                );
                continue;
            }
            enqueued += 1;
        }
        enqueued
    }
}

/// Per-job log streaming pipeline
pub struct LogPipeline {
    job_id: String,
    config: PipelineConfig,
    buffer: Arc<dyn LogBufferService>,
    uploader: Arc<dyn LogRepository>,
    state: PipelineState,
    producer: Arc<Mutex<ChunkProducer>>,
    cancel: CancellationToken,
    drain_handle: Option<JoinHandle<()>>,
    upload_handle: Option<JoinHandle<PipelineReport>>,
}

impl LogPipeline {
    /// Creates a stopped pipeline for one job
    ///
    /// # Arguments
    /// * `job_id` - The job whose output flows through the pipeline
    /// * `config` - Pipeline settings
    /// * `buffer` - The buffer command output is written to
    /// * `uploader` - Where chunks are uploaded
    pub fn new(
        job_id: impl Into<String>,
        config: PipelineConfig,
        buffer: Arc<dyn LogBufferService>,
        uploader: Arc<dyn LogRepository>,
    ) -> Self {
        let job_id = job_id.into();
        let chunker = Chunker::new(job_id.clone(), config.max_chunk_size);
        Self {
            job_id,
            config,
            buffer,
            uploader,
            state: PipelineState::Stopped,
            producer: Arc::new(Mutex::new(ChunkProducer {
                chunker,
                queue: None,
            })),
            cancel: CancellationToken::new(),
            drain_handle: None,
            upload_handle: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Starts the drain and upload workers
    ///
    /// A pipeline runs once; starting it again after `stop` is an error.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != PipelineState::Stopped || self.cancel.is_cancelled() {
            anyhow::bail!(
                "Log pipeline for job {} cannot be started from state {:?}",
                self.job_id,
                self.state
            );
        }

        let store = LocalChunkStore::new(self.config.logs_dir.clone());
        if let Err(e) = store.prepare().await {
            // Persisting will fail per chunk; uploads still go out.
            warn!("{:#}", e);
        }

        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));
        self.producer.lock().await.queue = Some(tx);

        self.drain_handle = Some(tokio::spawn(drain_worker(
            self.job_id.clone(),
            Arc::clone(&self.buffer),
            Arc::clone(&self.producer),
            self.config.drain_interval,
            self.cancel.clone(),
        )));
        self.upload_handle = Some(tokio::spawn(upload_worker(
            rx,
            store,
            Arc::clone(&self.uploader),
            self.config.upload_policy,
            self.cancel.clone(),
        )));

        self.state = PipelineState::Active;
        info!("Log pipeline started for job {}", self.job_id);
        Ok(())
    }

    /// Flushes remaining output and shuts the workers down
    ///
    /// Order: final drain, cancel, wait for both workers, close the queue.
    /// Callers must finish writing to the buffer before calling this.
    pub async fn stop(&mut self) -> Result<PipelineReport> {
        if self.state != PipelineState::Active {
            anyhow::bail!(
                "Log pipeline for job {} is not running (state {:?})",
                self.job_id,
                self.state
            );
        }
        self.state = PipelineState::Draining;

        let flushed = self
            .producer
            .lock()
            .await
            .drain_and_enqueue(self.buffer.as_ref())
            .await;
        debug!(
            "Final drain for job {} enqueued {} chunk(s)",
            self.job_id, flushed
        );

        self.cancel.cancel();

        if let Some(handle) = self.drain_handle.take() {
            if let Err(e) = handle.await {
                error!("Drain worker for job {} panicked: {}", self.job_id, e);
            }
        }

        let report = match self.upload_handle.take() {
            Some(handle) => match handle.await {
                Ok(report) => report,
                Err(e) => {
                    error!("Upload worker for job {} panicked: {}", self.job_id, e);
                    PipelineReport::default()
                }
            },
            None => PipelineReport::default(),
        };

        // Both workers are gone; close the queue.
        let produced = {
            let mut producer = self.producer.lock().await;
            producer.queue.take();
            producer.chunker.next_sequence()
        };

        let leftover = self.buffer.len();
        if leftover > 0 {
            warn!(
                "{} byte(s) were written to job {} output after shutdown began",
                leftover, self.job_id
            );
        }

        self.state = PipelineState::Stopped;
        info!(
            "Log pipeline stopped for job {}: {} chunk(s) ({} bytes) produced, {} uploaded, {} upload failure(s), {} persist failure(s)",
            self.job_id,
            produced,
            report.total_bytes(),
            report.uploaded(),
            report.upload_failures(),
            report.persist_failures()
        );
        Ok(report)
    }
}

impl Drop for LogPipeline {
    fn drop(&mut self) {
        if self.state() != PipelineState::Stopped {
            warn!(
                "Log pipeline for job {} dropped without stop; buffered output may be lost",
                self.job_id
            );
            self.cancel.cancel();
        }
    }
}

/// Periodically drains the buffer into the chunk queue until cancelled
async fn drain_worker(
    job_id: String,
    buffer: Arc<dyn LogBufferService>,
    producer: Arc<Mutex<ChunkProducer>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let enqueued = producer
            .lock()
            .await
            .drain_and_enqueue(buffer.as_ref())
            .await;
        if enqueued > 0 {
            debug!("Drained {} chunk(s) for job {}", enqueued, job_id);
        }
    }

    debug!("Drain worker for job {} exiting", job_id);
}

/// Persists and uploads chunks in queue order
///
/// Exits when the queue is closed, or when cancelled and the queue is empty.
/// A chunk being handled when cancellation fires is always finished.
async fn upload_worker(
    mut queue: mpsc::Receiver<LogChunk>,
    store: LocalChunkStore,
    uploader: Arc<dyn LogRepository>,
    policy: UploadPolicy,
    cancel: CancellationToken,
) -> PipelineReport {
    let mut report = PipelineReport::default();

    loop {
        let chunk = tokio::select! {
            biased;
            chunk = queue.recv() => match chunk {
                Some(chunk) => chunk,
                None => break,
            },
            _ = cancel.cancelled() => break,
        };

        let persist = match store.persist(&chunk).await {
            Ok(path) => PersistOutcome::Written(path),
            Err(e) => {
                error!("{:#}", e);
                PersistOutcome::Failed(format!("{:#}", e))
            }
        };

        let upload = upload_with_policy(uploader.as_ref(), &chunk, policy).await;

        report.receipts.push(ChunkReceipt {
            sequence: chunk.sequence,
            bytes: chunk.len(),
            persist,
            upload,
        });
    }

    report
}

/// Uploads one chunk, retrying with backoff up to the policy's attempt limit
pub async fn upload_with_policy(
    uploader: &dyn LogRepository,
    chunk: &LogChunk,
    policy: UploadPolicy,
) -> UploadOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut backoff = Backoff::new(policy.initial_backoff, MAX_UPLOAD_BACKOFF);
    let mut attempts = 0;

    loop {
        attempts += 1;
        match uploader.upload_chunk(chunk).await {
            Ok(()) => {
                debug!(
                    "Uploaded chunk {} of job {} ({} bytes)",
                    chunk.sequence,
                    chunk.job_id,
                    chunk.len()
                );
                return UploadOutcome::Uploaded { attempts };
            }
            Err(e) if attempts >= max_attempts => {
                error!(
                    "Giving up on chunk {} of job {} after {} attempt(s): {}",
                    chunk.sequence, chunk.job_id, attempts, e
                );
                return UploadOutcome::Failed {
                    attempts,
                    error: e.to_string(),
                };
            }
            Err(e) => {
                let delay = backoff.next_delay();
                warn!(
                    "Upload of chunk {} of job {} failed (attempt {}/{}): {}; retrying in {:?}",
                    chunk.sequence, chunk.job_id, attempts, max_attempts, e, delay
                );
                time::sleep(delay).await;
            }
        }
    }
}

//! Chunk processor: drives one source/sink pair to completion
//!
//! ```text
//! Idle -> Filling -> Flushing -> Filling ... -> Done
//!            |           |
//!            +-----------+--> Failed
//! ```
//!
//! Records are pulled into a [`Chunk`] until it is full or the source is
//! exhausted, then the chunk goes to the sink in a single `write`. A read
//! error discards the chunk being filled, so none of its records reach the
//! sink. Chunks are written strictly in fill order.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::chunk::Chunk;
use crate::error::Result;
use crate::listener::StepListener;
use crate::sink::RecordSink;
use crate::source::RecordSource;

/// Skip and retry thresholds for a step.
///
/// The default (all zero) fails the step on the first malformed item or
/// failed write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultPolicy {
    /// Malformed items a step may skip before the next one fails it
    pub skip_limit: u64,
    /// Extra attempts for a chunk whose write failed
    pub write_retry_limit: u32,
    /// Pause between write attempts
    pub retry_backoff: Duration,
}

/// Where the processor is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Idle,
    Filling,
    Flushing,
    Done,
    Failed,
}

/// Counters for one step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepStats {
    /// Records read and buffered (skipped items are not counted)
    pub read: u64,
    /// Records in chunks the sink accepted
    pub written: u64,
    pub skipped: u64,
    /// Chunks the sink accepted
    pub chunks: u64,
    pub write_retries: u64,
}

pub struct ChunkProcessor {
    step: String,
    chunk_size: usize,
    policy: FaultPolicy,
    listeners: Vec<Arc<dyn StepListener>>,
    state: ProcessorState,
    stats: StepStats,
    write_failed: bool,
}

impl ChunkProcessor {
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn new(step: impl Into<String>, chunk_size: usize, policy: FaultPolicy) -> Self {
        assert!(chunk_size > 0, "chunk capacity must be positive");
        Self {
            step: step.into(),
            chunk_size,
            policy,
            listeners: Vec::new(),
            state: ProcessorState::Idle,
            stats: StepStats::default(),
            write_failed: false,
        }
    }

    pub fn with_listeners(mut self, listeners: Vec<Arc<dyn StepListener>>) -> Self {
        self.listeners = listeners;
        self
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    pub fn stats(&self) -> StepStats {
        self.stats
    }

    /// Whether the step ended on a rejected `sink.write`, as opposed to a
    /// read error or a sink that never opened
    pub fn write_failed(&self) -> bool {
        self.write_failed
    }

    /// Move every record from `source` to `sink`. Both must already be open.
    pub async fn process(
        &mut self,
        source: &mut dyn RecordSource,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        let result = self.drive(source, sink).await;
        self.state = if result.is_ok() {
            ProcessorState::Done
        } else {
            ProcessorState::Failed
        };
        result
    }

    async fn drive(
        &mut self,
        source: &mut dyn RecordSource,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        let mut chunk = Chunk::with_capacity(self.chunk_size);

        loop {
            self.state = ProcessorState::Filling;
            let exhausted = self.fill(source, &mut chunk).await?;

            if !chunk.is_empty() {
                self.state = ProcessorState::Flushing;
                self.flush(sink, &chunk).await?;
                chunk.clear();
            }

            if exhausted {
                return Ok(());
            }
        }
    }

    /// Fill `chunk` until it is full or the source ends. Returns whether the
    /// source is exhausted.
    async fn fill(&mut self, source: &mut dyn RecordSource, chunk: &mut Chunk) -> Result<bool> {
        while !chunk.is_full() {
            match source.next().await {
                Ok(Some(record)) => {
                    self.stats.read += 1;
                    for listener in &self.listeners {
                        listener.after_read(&self.step, &record);
                    }
                    let pushed = chunk.push(record);
                    debug_assert!(pushed.is_ok(), "filled past capacity");
                },
                Ok(None) => return Ok(true),
                Err(err) => {
                    for listener in &self.listeners {
                        listener.on_read_error(&self.step, &err);
                    }
                    if err.is_parse() && self.stats.skipped < self.policy.skip_limit {
                        self.stats.skipped += 1;
                        for listener in &self.listeners {
                            listener.on_skip(&self.step, &err);
                        }
                        continue;
                    }
                    debug!(
                        step = %self.step,
                        discarded = chunk.len(),
                        "Read failed, discarding chunk"
                    );
                    return Err(err);
                },
            }
        }
        Ok(false)
    }

    async fn flush(&mut self, sink: &mut dyn RecordSink, chunk: &Chunk) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            match sink.write(chunk.records()).await {
                Ok(()) => break,
                Err(err) if err.is_write() && attempt < self.policy.write_retry_limit => {
                    attempt += 1;
                    self.stats.write_retries += 1;
                    warn!(
                        step = %self.step,
                        attempt,
                        max_retries = self.policy.write_retry_limit,
                        error = %err,
                        "Chunk write failed, retrying"
                    );
                    tokio::time::sleep(self.policy.retry_backoff).await;
                },
                Err(err) => {
                    self.write_failed = true;
                    return Err(err);
                },
            }
        }

        self.stats.chunks += 1;
        self.stats.written += chunk.len() as u64;
        debug!(
            step = %self.step,
            chunk = self.stats.chunks,
            records = chunk.len(),
            "Chunk committed"
        );
        for listener in &self.listeners {
            listener.after_write(&self.step, self.stats.chunks, chunk.records());
        }
        Ok(())
    }
}

//! A named unit of work: one source, one sink, one chunk processor run

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info_span, warn, Instrument};

use crate::chunk::DEFAULT_CHUNK_SIZE;
use crate::error::{BatchError, Result};
use crate::listener::StepListener;
use crate::processor::{ChunkProcessor, FaultPolicy, StepStats};
use crate::sink::{Atomicity, RecordSink};
use crate::source::RecordSource;

/// Terminal state of a step
#[derive(Debug)]
pub enum StepOutcome {
    Completed,
    Failed(StepFailure),
}

impl StepOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepOutcome::Completed)
    }
}

/// Why a step failed
#[derive(Debug)]
pub struct StepFailure {
    pub cause: BatchError,
    /// A `write` call failed on a sink without chunk transactions, so part
    /// of the rejected chunk may already be in the destination. Open and
    /// close failures never set it.
    pub partial_write_possible: bool,
}

/// What a step did, kept by the run
#[derive(Debug)]
pub struct StepReport {
    pub step: String,
    pub outcome: StepOutcome,
    pub stats: StepStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StepReport {
    pub fn elapsed(&self) -> Duration {
        self.finished_at - self.started_at
    }

    pub fn failure(&self) -> Option<&StepFailure> {
        match &self.outcome {
            StepOutcome::Failed(failure) => Some(failure),
            StepOutcome::Completed => None,
        }
    }
}

/// A source and sink bound together with the chunking rules that join them.
///
/// The step opens both ends, runs the processor and closes both ends again
/// on every exit path. It does not retry on its own.
pub struct Step {
    name: String,
    source: Box<dyn RecordSource>,
    sink: Box<dyn RecordSink>,
    chunk_size: usize,
    policy: FaultPolicy,
    listeners: Vec<Arc<dyn StepListener>>,
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("source", &self.source.name())
            .field("sink", &self.sink.name())
            .field("chunk_size", &self.chunk_size)
            .field("policy", &self.policy)
            .finish()
    }
}

impl Step {
    pub fn builder(name: impl Into<String>) -> StepBuilder {
        StepBuilder {
            name: name.into(),
            source: None,
            sink: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            policy: FaultPolicy::default(),
            listeners: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the step to a terminal outcome
    pub async fn execute(&mut self) -> StepReport {
        let span = info_span!(
            "step",
            step = %self.name,
            source = %self.source.name(),
            sink = %self.sink.name()
        );
        self.execute_inner().instrument(span).await
    }

    async fn execute_inner(&mut self) -> StepReport {
        let started_at = Utc::now();
        for listener in &self.listeners {
            listener.before_step(&self.name);
        }

        let mut processor = ChunkProcessor::new(&self.name, self.chunk_size, self.policy)
            .with_listeners(self.listeners.clone());

        let mut result = self.open_and_process(&mut processor).await;

        for close in [self.source.close().await, self.sink.close().await] {
            if let Err(err) = close {
                if result.is_ok() {
                    result = Err(err);
                } else {
                    warn!(error = %err, "Close failed after step failure");
                }
            }
        }

        let outcome = match result {
            Ok(()) => StepOutcome::Completed,
            Err(cause) => {
                let partial_write_possible = processor.write_failed()
                    && self.sink.atomicity() == Atomicity::BestEffort;
                StepOutcome::Failed(StepFailure {
                    cause,
                    partial_write_possible,
                })
            },
        };

        let report = StepReport {
            step: self.name.clone(),
            outcome,
            stats: processor.stats(),
            started_at,
            finished_at: Utc::now(),
        };
        for listener in &self.listeners {
            listener.after_step(&report);
        }
        report
    }

    async fn open_and_process(&mut self, processor: &mut ChunkProcessor) -> Result<()> {
        self.source.open().await?;
        self.sink.open().await?;
        processor
            .process(self.source.as_mut(), self.sink.as_mut())
            .await
    }
}

/// Builder for [`Step`]
pub struct StepBuilder {
    name: String,
    source: Option<Box<dyn RecordSource>>,
    sink: Option<Box<dyn RecordSink>>,
    chunk_size: usize,
    policy: FaultPolicy,
    listeners: Vec<Arc<dyn StepListener>>,
}

impl StepBuilder {
    pub fn source(mut self, source: impl RecordSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn sink(mut self, sink: impl RecordSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn listener(mut self, listener: Arc<dyn StepListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn build(self) -> Result<Step> {
        let source = self
            .source
            .ok_or_else(|| BatchError::Config(format!("step '{}' has no source", self.name)))?;
        let sink = self
            .sink
            .ok_or_else(|| BatchError::Config(format!("step '{}' has no sink", self.name)))?;
        if self.chunk_size == 0 {
            return Err(BatchError::Config(format!(
                "step '{}' needs a chunk size greater than 0",
                self.name
            )));
        }

        Ok(Step {
            name: self.name,
            source,
            sink,
            chunk_size: self.chunk_size,
            policy: self.policy,
            listeners: self.listeners,
        })
    }
}

//! Observer hooks for steps and runs
//!
//! Listeners are called synchronously at fixed points and cannot change what
//! the pipeline does next: every hook returns `()` and takes its arguments by
//! reference. All hooks default to no-ops, so an implementation only
//! overrides what it cares about.

use booklift_common::Record;
use tracing::{error, info, warn};

use crate::error::BatchError;
use crate::runner::{Run, RunStatus};
use crate::step::{StepOutcome, StepReport};

/// Hooks around one step execution
pub trait StepListener: Send + Sync {
    fn before_step(&self, _step: &str) {}

    /// A record was read and added to the current chunk
    fn after_read(&self, _step: &str, _record: &Record) {}

    /// The source returned an error; called before the skip decision
    fn on_read_error(&self, _step: &str, _error: &BatchError) {}

    /// A malformed item was skipped under the fault policy
    fn on_skip(&self, _step: &str, _error: &BatchError) {}

    /// A chunk was accepted by the sink
    fn after_write(&self, _step: &str, _chunk: u64, _records: &[Record]) {}

    fn after_step(&self, _report: &StepReport) {}
}

/// Hooks around a whole run
pub trait RunListener: Send + Sync {
    fn before_run(&self, _run: &str, _steps: &[String]) {}

    fn after_run(&self, _run: &Run) {}
}

/// Writes lifecycle events to `tracing`
#[derive(Debug, Clone, Default)]
pub struct LoggingListener {
    log_reads: bool,
}

impl LoggingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also log every record as it is read
    pub fn with_reads(mut self) -> Self {
        self.log_reads = true;
        self
    }
}

impl StepListener for LoggingListener {
    fn before_step(&self, step: &str) {
        info!(step = %step, "Step starting");
    }

    fn after_read(&self, step: &str, record: &Record) {
        if self.log_reads {
            info!(step = %step, id = record.id, name = %record.name, "Read record");
        }
    }

    fn on_read_error(&self, step: &str, error: &BatchError) {
        warn!(step = %step, error = %error, "Read failed");
    }

    fn on_skip(&self, step: &str, error: &BatchError) {
        warn!(step = %step, error = %error, "Skipped malformed record");
    }

    fn after_step(&self, report: &StepReport) {
        let stats = &report.stats;
        match &report.outcome {
            StepOutcome::Completed => info!(
                step = %report.step,
                read = stats.read,
                written = stats.written,
                skipped = stats.skipped,
                chunks = stats.chunks,
                elapsed_ms = report.elapsed().num_milliseconds(),
                "Step completed"
            ),
            StepOutcome::Failed(failure) => error!(
                step = %report.step,
                read = stats.read,
                written = stats.written,
                partial_write_possible = failure.partial_write_possible,
                error = %failure.cause,
                "Step failed"
            ),
        }
    }
}

impl RunListener for LoggingListener {
    fn before_run(&self, run: &str, steps: &[String]) {
        info!(run = %run, steps = ?steps, "Run starting");
    }

    fn after_run(&self, run: &Run) {
        match &run.status {
            RunStatus::Completed => info!(
                run = %run.name,
                steps = run.reports.len(),
                elapsed_ms = run.elapsed().num_milliseconds(),
                "Run completed"
            ),
            RunStatus::Failed { step } => error!(run = %run.name, step = %step, "Run failed"),
            RunStatus::Cancelled { next_step } => {
                warn!(run = %run.name, next_step = %next_step, "Run cancelled")
            },
        }
    }
}

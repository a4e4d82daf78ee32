//! Sequential step runner

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

use crate::listener::RunListener;
use crate::step::{Step, StepFailure, StepReport};

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// A step failed; the steps after it were not attempted
    Failed { step: String },
    /// Cancellation was observed before `next_step` started
    Cancelled { next_step: String },
}

/// One pipeline execution. Holds a report for exactly the steps that were
/// attempted, in order.
#[derive(Debug)]
pub struct Run {
    pub name: String,
    pub status: RunStatus,
    pub reports: Vec<StepReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Run {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// The failed step's name and cause, if a step failed
    pub fn failure(&self) -> Option<(&str, &StepFailure)> {
        self.reports
            .iter()
            .find_map(|report| report.failure().map(|failure| (report.step.as_str(), failure)))
    }

    pub fn elapsed(&self) -> Duration {
        self.finished_at - self.started_at
    }
}

/// Runs steps strictly one after another, stopping at the first failure.
///
/// Cancellation is checked between steps only: a step that has started
/// always runs to its own terminal outcome.
pub struct PipelineRunner {
    name: String,
    listeners: Vec<Arc<dyn RunListener>>,
    cancel: CancellationToken,
}

impl PipelineRunner {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            listeners: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn listener(mut self, listener: Arc<dyn RunListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub async fn run(&self, steps: Vec<Step>) -> Run {
        let span = info_span!("run", run = %self.name);
        self.run_inner(steps).instrument(span).await
    }

    async fn run_inner(&self, mut steps: Vec<Step>) -> Run {
        let names: Vec<String> = steps.iter().map(|step| step.name().to_string()).collect();
        let started_at = Utc::now();
        for listener in &self.listeners {
            listener.before_run(&self.name, &names);
        }

        let mut reports = Vec::with_capacity(steps.len());
        let mut status = RunStatus::Completed;

        for step in steps.iter_mut() {
            if self.cancel.is_cancelled() {
                info!(next_step = %step.name(), "Cancellation requested, stopping before step");
                status = RunStatus::Cancelled {
                    next_step: step.name().to_string(),
                };
                break;
            }

            let report = step.execute().await;
            let completed = report.outcome.is_completed();
            reports.push(report);

            if !completed {
                status = RunStatus::Failed {
                    step: step.name().to_string(),
                };
                break;
            }
        }

        let run = Run {
            name: self.name.clone(),
            status,
            reports,
            started_at,
            finished_at: Utc::now(),
        };
        for listener in &self.listeners {
            listener.after_run(&run);
        }
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::tests::{RecordingSink, ScriptedSource};
    use booklift_common::{ParseError, Record};
    use std::sync::Mutex;

    #[derive(Default)]
    struct EventLog {
        events: Mutex<Vec<String>>,
    }

    impl RunListener for EventLog {
        fn before_run(&self, run: &str, steps: &[String]) {
            self.events
                .lock()
                .unwrap()
                .push(format!("start {} {:?}", run, steps));
        }

        fn after_run(&self, run: &Run) {
            self.events
                .lock()
                .unwrap()
                .push(format!("end {} {:?}", run.name, run.status));
        }
    }

    fn step(name: &str, source: ScriptedSource, sink: &RecordingSink) -> Step {
        Step::builder(name)
            .source(source)
            .sink(sink.clone())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_all_steps_run_in_order() {
        let log = Arc::new(EventLog::default());
        let sink = RecordingSink::default();
        let steps = vec![
            step("one", ScriptedSource::records(1..=2), &sink),
            step("two", ScriptedSource::records(3..=4), &sink),
        ];

        let run = PipelineRunner::new("test")
            .listener(log.clone())
            .run(steps)
            .await;

        assert!(run.is_success());
        assert!(run.failure().is_none());
        let names: Vec<&str> = run.reports.iter().map(|r| r.step.as_str()).collect();
        assert_eq!(names, vec!["one", "two"]);
        let ids: Vec<i64> = sink.chunks().concat().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(
            *log.events.lock().unwrap(),
            vec![
                r#"start test ["one", "two"]"#.to_string(),
                "end test Completed".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_step_stops_the_run() {
        let sink = RecordingSink::default();
        let later = RecordingSink::default();
        let steps = vec![
            step("one", ScriptedSource::records(1..=2), &sink),
            step(
                "two",
                ScriptedSource::new(vec![Err(ParseError::malformed("bad").into())]),
                &sink,
            ),
            step("three", ScriptedSource::records(5..=6), &later),
        ];

        let run = PipelineRunner::new("test").run(steps).await;

        assert_eq!(
            run.status,
            RunStatus::Failed {
                step: "two".to_string()
            }
        );
        assert_eq!(run.reports.len(), 2);
        let (step, failure) = run.failure().unwrap();
        assert_eq!(step, "two");
        assert!(failure.cause.is_parse());
        assert!(later.chunks().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_first_step() {
        let token = CancellationToken::new();
        token.cancel();
        let sink = RecordingSink::default();

        let run = PipelineRunner::new("test")
            .cancellation(token)
            .run(vec![step("one", ScriptedSource::records(1..=2), &sink)])
            .await;

        assert_eq!(
            run.status,
            RunStatus::Cancelled {
                next_step: "one".to_string()
            }
        );
        assert!(run.reports.is_empty());
        assert!(sink.chunks().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_between_steps_lets_current_step_finish() {
        struct CancelAfterFirst(CancellationToken);

        impl crate::listener::StepListener for CancelAfterFirst {
            fn after_write(&self, _step: &str, _chunk: u64, _records: &[Record]) {
                self.0.cancel();
            }
        }

        let token = CancellationToken::new();
        let sink = RecordingSink::default();
        let first = Step::builder("one")
            .source(ScriptedSource::records(1..=6))
            .sink(sink.clone())
            .chunk_size(2)
            .listener(Arc::new(CancelAfterFirst(token.clone())))
            .build()
            .unwrap();

        let run = PipelineRunner::new("test")
            .cancellation(token)
            .run(vec![first, step("two", ScriptedSource::records(7..=8), &sink)])
            .await;

        assert_eq!(
            run.status,
            RunStatus::Cancelled {
                next_step: "two".to_string()
            }
        );
        assert_eq!(run.reports.len(), 1);
        assert_eq!(sink.chunk_sizes(), vec![2, 2, 2]);
    }
}

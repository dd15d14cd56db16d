//! Mock workers for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

use crate::core::Stage;
use crate::workers::{StageInput, Worker, WorkerContext, WorkerError, WorkerOutput};

/// A worker that always returns the same output and counts its calls.
#[derive(Debug)]
pub struct StaticWorker {
    name: String,
    output: WorkerOutput,
    units: u32,
    call_count: Mutex<usize>,
}

impl StaticWorker {
    /// Creates a worker returning `content` with `score`.
    #[must_use]
    pub fn new(name: impl Into<String>, content: serde_json::Value, score: f64) -> Self {
        Self {
            name: name.into(),
            output: WorkerOutput::new(content, score),
            units: 1,
            call_count: Mutex::new(0),
        }
    }

    /// Sets the number of non-fatal errors reported.
    #[must_use]
    pub fn with_error_count(mut self, error_count: u32) -> Self {
        self.output.error_count = error_count;
        self
    }

    /// Sets the expected work units.
    #[must_use]
    pub fn with_units(mut self, units: u32) -> Self {
        self.units = units;
        self
    }

    /// Returns the number of times the worker was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl Worker for StaticWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn expected_units(&self, _input: &StageInput) -> u32 {
        self.units
    }

    async fn execute(&self, _input: StageInput, _ctx: WorkerContext) -> Result<WorkerOutput, WorkerError> {
        *self.call_count.lock() += 1;
        Ok(self.output.clone())
    }
}

/// A worker that always fails.
#[derive(Debug)]
pub struct FailingWorker {
    name: String,
    message: String,
    call_count: Mutex<usize>,
}

impl FailingWorker {
    /// Creates a failing worker with an error message.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            call_count: Mutex::new(0),
        }
    }

    /// Returns the number of times the worker was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl Worker for FailingWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _input: StageInput, _ctx: WorkerContext) -> Result<WorkerOutput, WorkerError> {
        *self.call_count.lock() += 1;
        Err(WorkerError::failed(self.message.clone()))
    }
}

/// A worker that takes `delay` to finish and stops early when cancelled.
#[derive(Debug)]
pub struct SlowWorker {
    name: String,
    delay: Duration,
    started: Mutex<usize>,
    finished: Mutex<usize>,
}

impl SlowWorker {
    /// Creates a slow worker.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
            started: Mutex::new(0),
            finished: Mutex::new(0),
        }
    }

    /// Number of calls that began.
    #[must_use]
    pub fn started(&self) -> usize {
        *self.started.lock()
    }

    /// Number of calls that ran to the end.
    #[must_use]
    pub fn finished(&self) -> usize {
        *self.finished.lock()
    }
}

#[async_trait]
impl Worker for SlowWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, input: StageInput, ctx: WorkerContext) -> Result<WorkerOutput, WorkerError> {
        *self.started.lock() += 1;
        tokio::select! {
            () = tokio::time::sleep(self.delay) => {
                *self.finished.lock() += 1;
                Ok(WorkerOutput::new(serde_json::json!(input.stage.as_str()), 1.0))
            }
            () = ctx.cancelled() => Err(WorkerError::Cancelled(format!("{} stopped", self.name))),
        }
    }
}

/// What a [`RecordingWorker`] saw on one call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// The input it was given.
    pub input: StageInput,
    /// Whether the run was paused when the call began.
    pub paused: bool,
}

/// A worker that records every input and echoes the stage it produced.
#[derive(Debug, Default)]
pub struct RecordingWorker {
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingWorker {
    /// Creates a recording worker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded call.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Returns the stages called, in call order.
    #[must_use]
    pub fn stages(&self) -> Vec<Stage> {
        self.calls.lock().iter().map(|c| c.input.stage).collect()
    }
}

#[async_trait]
impl Worker for RecordingWorker {
    fn name(&self) -> &str {
        "recording"
    }

    async fn execute(&self, input: StageInput, ctx: WorkerContext) -> Result<WorkerOutput, WorkerError> {
        let content = serde_json::json!({
            "stage": input.stage,
            "prior": input.prior_outputs.len(),
        });
        self.calls.lock().push(RecordedCall {
            input,
            paused: ctx.is_paused(),
        });
        Ok(WorkerOutput::new(content, 0.75))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::RunControl;
    use crate::orchestrator::ProductionRequest;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use uuid::Uuid;

    fn call(stage: Stage, control: &RunControl) -> (StageInput, WorkerContext) {
        let run_id = Uuid::new_v4();
        (
            StageInput::new(run_id, stage, Arc::new(ProductionRequest::new()), BTreeMap::new()),
            WorkerContext::new(run_id, stage, control),
        )
    }

    #[tokio::test]
    async fn test_static_worker_counts_calls() {
        let worker = StaticWorker::new("s", serde_json::json!(1), 0.5).with_error_count(2);
        let control = RunControl::new();
        let (input, ctx) = call(Stage::TopicDiscovery, &control);

        let output = worker.execute(input, ctx).await.unwrap();
        assert_eq!(output.error_count, 2);
        assert_eq!(worker.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_worker() {
        let worker = FailingWorker::new("f", "boom");
        let control = RunControl::new();
        let (input, ctx) = call(Stage::ArticleReview, &control);

        let err = worker.execute(input, ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn test_slow_worker_stops_on_cancel() {
        let worker = SlowWorker::new("slow", Duration::from_secs(30));
        let control = RunControl::new();
        let (input, ctx) = call(Stage::ArticleWriting, &control);
        control.cancel("enough");

        let err = worker.execute(input, ctx).await.unwrap_err();
        assert!(matches!(err, WorkerError::Cancelled(_)));
        assert_eq!(worker.started(), 1);
        assert_eq!(worker.finished(), 0);
    }

    #[tokio::test]
    async fn test_recording_worker() {
        let worker = RecordingWorker::new();
        let control = RunControl::new();
        control.pause();
        let (input, ctx) = call(Stage::TopicResearch, &control);

        worker.execute(input, ctx).await.unwrap();
        assert_eq!(worker.stages(), vec![Stage::TopicResearch]);
        assert!(worker.calls()[0].paused);
    }
}

//! The worker boundary.
//!
//! Workers are the external producers behind each stage. The orchestrator
//! hands each one a [`StageInput`] built from earlier outputs and a
//! [`WorkerContext`] carrying the run's cancel and pause signals.

mod context;
mod registry;

pub use crate::errors::WorkerError;
pub use context::{StageInput, WorkerContext};
pub use registry::WorkerRegistry;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// What a worker produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerOutput {
    /// The produced content, carried forward to later stages.
    pub content: serde_json::Value,
    /// Advisory quality score in `[0, 1]`.
    pub score: f64,
    /// Non-fatal problems the worker ran into.
    #[serde(default)]
    pub error_count: u32,
}

impl WorkerOutput {
    /// Creates an output with no reported errors.
    #[must_use]
    pub fn new(content: serde_json::Value, score: f64) -> Self {
        Self {
            content,
            score,
            error_count: 0,
        }
    }

    /// Sets the number of non-fatal errors.
    #[must_use]
    pub fn with_error_count(mut self, error_count: u32) -> Self {
        self.error_count = error_count;
        self
    }
}

/// An external producer for one stage.
///
/// `execute` is invoked at most once per stage per run. It may take
/// arbitrarily long; cooperative workers should check
/// [`WorkerContext::is_cancelled`] and [`WorkerContext::is_paused`] between
/// sub-steps. Workers that ignore them are still safe: a cancelled run drops
/// the call, a paused run waits for it to return.
#[async_trait]
pub trait Worker: Send + Sync + Debug {
    /// Returns the name of the worker.
    fn name(&self) -> &str;

    /// Work units the stage is expected to take.
    fn expected_units(&self, _input: &StageInput) -> u32 {
        1
    }

    /// Produces the stage output.
    async fn execute(&self, input: StageInput, ctx: WorkerContext) -> Result<WorkerOutput, WorkerError>;
}

type WorkerFn =
    dyn Fn(StageInput, WorkerContext) -> BoxFuture<'static, Result<WorkerOutput, WorkerError>> + Send + Sync;

/// A closure-based worker.
///
/// ```
/// use contentflow::workers::{FnWorker, WorkerOutput};
/// use futures::FutureExt;
///
/// let worker = FnWorker::new("echo", |input, _ctx| {
///     async move { Ok(WorkerOutput::new(serde_json::json!(input.stage.to_string()), 1.0)) }.boxed()
/// });
/// ```
pub struct FnWorker {
    name: String,
    func: Box<WorkerFn>,
}

impl FnWorker {
    /// Creates a new closure-based worker.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(StageInput, WorkerContext) -> BoxFuture<'static, Result<WorkerOutput, WorkerError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

impl Debug for FnWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnWorker").field("name", &self.name).finish()
    }
}

#[async_trait]
impl Worker for FnWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, input: StageInput, ctx: WorkerContext) -> Result<WorkerOutput, WorkerError> {
        (self.func)(input, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::RunControl;
    use crate::core::Stage;
    use crate::orchestrator::ProductionRequest;
    use futures::FutureExt;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_fn_worker() {
        let worker = FnWorker::new("upper", |input, _ctx| {
            async move {
                let topic = input.request.topic.clone().unwrap_or_default();
                Ok(WorkerOutput::new(serde_json::json!(topic.to_uppercase()), 0.8))
            }
            .boxed()
        });
        assert_eq!(worker.name(), "upper");

        let run_id = Uuid::new_v4();
        let control = RunControl::new();
        let input = StageInput::new(
            run_id,
            Stage::TopicDiscovery,
            Arc::new(ProductionRequest::new().with_topic("wasm")),
            BTreeMap::new(),
        );
        assert_eq!(worker.expected_units(&input), 1);

        let ctx = WorkerContext::new(run_id, Stage::TopicDiscovery, &control);
        let output = worker.execute(input, ctx).await.unwrap();
        assert_eq!(output.content, serde_json::json!("WASM"));
        assert_eq!(output.error_count, 0);
    }
}

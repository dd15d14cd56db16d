//! Inputs and signals handed to workers.

use crate::cancellation::{CancellationToken, RunControl};
use crate::core::Stage;
use crate::orchestrator::ProductionRequest;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Everything a worker needs to produce its stage's output.
#[derive(Debug, Clone)]
pub struct StageInput {
    /// The run being produced.
    pub run_id: Uuid,
    /// The stage to produce.
    pub stage: Stage,
    /// The original request.
    pub request: Arc<ProductionRequest>,
    /// Outputs of earlier stages whose workers ran, in stage order.
    pub prior_outputs: BTreeMap<Stage, serde_json::Value>,
}

impl StageInput {
    /// Creates a stage input.
    #[must_use]
    pub fn new(
        run_id: Uuid,
        stage: Stage,
        request: Arc<ProductionRequest>,
        prior_outputs: BTreeMap<Stage, serde_json::Value>,
    ) -> Self {
        Self {
            run_id,
            stage,
            request,
            prior_outputs,
        }
    }

    /// Output of an earlier stage.
    #[must_use]
    pub fn output_of(&self, stage: Stage) -> Option<&serde_json::Value> {
        self.prior_outputs.get(&stage)
    }

    /// Output of the most recent stage that produced one.
    #[must_use]
    pub fn previous_output(&self) -> Option<&serde_json::Value> {
        self.prior_outputs.values().next_back()
    }
}

/// Cancel and pause signals visible to a running worker.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    run_id: Uuid,
    stage: Stage,
    token: CancellationToken,
    paused: watch::Receiver<bool>,
}

impl WorkerContext {
    /// Creates a context bound to a run's control signals.
    #[must_use]
    pub fn new(run_id: Uuid, stage: Stage, control: &RunControl) -> Self {
        Self {
            run_id,
            stage,
            token: control.token(),
            paused: control.pause_receiver(),
        }
    }

    /// The run being produced.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The stage being produced.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns true once the run is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns true while the run is paused. Workers should not start new
    /// sub-work while this holds.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Completes once the run is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_previous_output() {
        let mut prior = BTreeMap::new();
        prior.insert(Stage::TopicDiscovery, json!("topic"));
        prior.insert(Stage::TopicResearch, json!({"sources": 3}));
        let input = StageInput::new(
            Uuid::new_v4(),
            Stage::ArticleWriting,
            Arc::new(ProductionRequest::new()),
            prior,
        );

        assert_eq!(input.previous_output(), Some(&json!({"sources": 3})));
        assert_eq!(input.output_of(Stage::TopicDiscovery), Some(&json!("topic")));
        assert!(input.output_of(Stage::StyleAdaptation).is_none());
    }

    #[test]
    fn test_context_observes_control() {
        let control = RunControl::new();
        let ctx = WorkerContext::new(Uuid::new_v4(), Stage::ArticleWriting, &control);
        assert!(!ctx.is_paused());
        assert!(!ctx.is_cancelled());

        control.pause();
        assert!(ctx.is_paused());
        control.cancel("done");
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.stage(), Stage::ArticleWriting);
    }
}

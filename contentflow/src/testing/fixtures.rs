//! Fixtures for orchestrator tests.

use std::sync::Arc;

use super::StaticWorker;
use crate::core::Stage;
use crate::orchestrator::{AutomationConfig, OrchestratorConfig};
use crate::progress::StageWeights;
use crate::workers::{Worker, WorkerRegistry};

/// Weights of 10, 20, 40, 15, and 15 percent in stage order.
#[must_use]
pub fn default_weights() -> StageWeights {
    StageWeights::from_percentages([10.0, 20.0, 40.0, 15.0, 15.0])
        .unwrap_or_else(|e| unreachable!("fixture weights are valid: {e}"))
}

/// A fully automatic configuration without timeouts.
#[must_use]
pub fn default_config() -> OrchestratorConfig {
    OrchestratorConfig::new(default_weights(), AutomationConfig::default())
}

/// A registry with the same worker on every real stage.
#[must_use]
pub fn registry_with(worker: Arc<dyn Worker>) -> WorkerRegistry {
    let mut registry = WorkerRegistry::new();
    for stage in Stage::REAL {
        registry
            .register(stage, Arc::clone(&worker))
            .unwrap_or_else(|e| unreachable!("real stages always register: {e}"));
    }
    registry
}

/// A registry with a [`StaticWorker`] named after each real stage.
#[must_use]
pub fn static_workers() -> WorkerRegistry {
    let mut registry = WorkerRegistry::new();
    for stage in Stage::REAL {
        let worker = StaticWorker::new(
            stage.as_str(),
            serde_json::json!(format!("{stage} output")),
            0.9,
        );
        registry
            .register(stage, Arc::new(worker))
            .unwrap_or_else(|e| unreachable!("real stages always register: {e}"));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_are_valid() {
        tokio_test::assert_ok!(default_config().validate());
        tokio_test::assert_ok!(static_workers().validate());
        assert_eq!(static_workers().len(), Stage::REAL.len());
    }

    #[test]
    fn test_registry_with_covers_every_real_stage() {
        let worker: Arc<dyn Worker> = Arc::new(StaticWorker::new("shared", serde_json::json!("x"), 0.5));
        let registry = registry_with(worker);

        tokio_test::assert_ok!(registry.validate());
        assert_eq!(registry.len(), Stage::REAL.len());
        for stage in Stage::REAL {
            assert!(registry.contains(stage), "{stage} should have a worker");
        }
    }
}

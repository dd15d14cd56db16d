//! Stage → worker mapping.

use super::Worker;
use crate::core::Stage;
use crate::errors::{codes, ConfigurationError, ContractViolation};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The worker assigned to each real stage.
#[derive(Debug, Clone, Default)]
pub struct WorkerRegistry {
    workers: BTreeMap<Stage, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a worker to a stage, replacing any previous one.
    pub fn register(&mut self, stage: Stage, worker: Arc<dyn Worker>) -> Result<(), ContractViolation> {
        if !stage.is_real() {
            return Err(ContractViolation::new(
                codes::NOT_REAL_STAGE,
                format!("cannot register a worker for pseudo-stage '{stage}'"),
            )
            .with_stage(stage));
        }
        self.workers.insert(stage, worker);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, stage: Stage, worker: Arc<dyn Worker>) -> Result<Self, ContractViolation> {
        self.register(stage, worker)?;
        Ok(self)
    }

    /// Returns the worker for a stage.
    #[must_use]
    pub fn get(&self, stage: Stage) -> Option<Arc<dyn Worker>> {
        self.workers.get(&stage).cloned()
    }

    /// Returns true if a stage has a worker.
    #[must_use]
    pub fn contains(&self, stage: Stage) -> bool {
        self.workers.contains_key(&stage)
    }

    /// Returns the number of registered workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Returns true if no workers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Checks that every mandatory stage has a worker.
    ///
    /// Optional stages may stay empty; requests that need them are rejected
    /// when the run is admitted.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let missing: Vec<String> = Stage::REAL
            .into_iter()
            .filter(|s| !s.is_optional() && !self.contains(*s))
            .map(|s| s.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::new(format!(
                "no worker registered for: {}",
                missing.join(", ")
            ))
            .with_field("workers"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticWorker;

    fn worker() -> Arc<dyn Worker> {
        Arc::new(StaticWorker::new("static", serde_json::json!("ok"), 1.0))
    }

    #[test]
    fn test_register_and_get() {
        let registry = WorkerRegistry::new()
            .with(Stage::TopicDiscovery, worker())
            .unwrap();
        assert!(registry.contains(Stage::TopicDiscovery));
        assert_eq!(registry.get(Stage::TopicDiscovery).unwrap().name(), "static");
        assert!(registry.get(Stage::TopicResearch).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_pseudo_stage_rejected() {
        let mut registry = WorkerRegistry::new();
        let err = registry.register(Stage::Paused, worker()).unwrap_err();
        assert_eq!(err.code, codes::NOT_REAL_STAGE);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_validate_allows_missing_optional_stage() {
        let mut registry = WorkerRegistry::new();
        for stage in Stage::REAL.into_iter().filter(|s| !s.is_optional()) {
            registry.register(stage, worker()).unwrap();
        }
        tokio_test::assert_ok!(registry.validate());
    }

    #[test]
    fn test_validate_reports_missing() {
        let registry = WorkerRegistry::new()
            .with(Stage::TopicDiscovery, worker())
            .unwrap();
        let err = registry.validate().unwrap_err();
        assert!(err.message.contains("article_writing"));
        assert!(!err.message.contains("style_adaptation"));
    }
}

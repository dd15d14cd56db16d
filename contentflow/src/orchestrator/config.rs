//! Orchestrator configuration.

use crate::automation::{AutomationMode, AutomationPolicy};
use crate::core::Stage;
use crate::errors::{ConfigurationError, ContentflowError};
use crate::progress::StageWeights;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Which stages run without confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// The automation mode.
    pub mode: AutomationMode,
    /// Stages that run automatically in `mixed` mode.
    #[serde(default)]
    pub auto_stages: Vec<Stage>,
}

impl AutomationConfig {
    /// Creates an automation section.
    #[must_use]
    pub fn new(mode: AutomationMode, auto_stages: impl Into<Vec<Stage>>) -> Self {
        Self {
            mode,
            auto_stages: auto_stages.into(),
        }
    }
}

/// Configuration for a [`PipelineOrchestrator`](super::PipelineOrchestrator).
///
/// Weights and the automation section are required. Both timeouts are
/// optional; without them confirmations and workers may wait forever.
///
/// ```
/// use contentflow::orchestrator::OrchestratorConfig;
///
/// let config = OrchestratorConfig::from_json_str(r#"{
///     "automation": {"mode": "mixed", "auto_stages": ["topic_discovery"]},
///     "stage_weights": {
///         "topic_discovery": 10, "topic_research": 20, "article_writing": 40,
///         "style_adaptation": 15, "article_review": 15
///     },
///     "worker_timeout_seconds": 120
/// }"#).unwrap();
/// assert!(config.confirmation_timeout().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Automation policy section.
    pub automation: AutomationConfig,
    /// Progress weight of every real stage, in percent.
    pub stage_weights: StageWeights,
    /// How long a non-auto stage waits for confirmation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_timeout_seconds: Option<f64>,
    /// How long a single worker call may take.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_timeout_seconds: Option<f64>,
}

impl OrchestratorConfig {
    /// Creates a configuration without timeouts.
    #[must_use]
    pub fn new(stage_weights: StageWeights, automation: AutomationConfig) -> Self {
        Self {
            automation,
            stage_weights,
            confirmation_timeout_seconds: None,
            worker_timeout_seconds: None,
        }
    }

    /// Sets the confirmation timeout.
    #[must_use]
    pub fn with_confirmation_timeout(mut self, seconds: f64) -> Self {
        self.confirmation_timeout_seconds = Some(seconds);
        self
    }

    /// Sets the worker timeout.
    #[must_use]
    pub fn with_worker_timeout(mut self, seconds: f64) -> Self {
        self.worker_timeout_seconds = Some(seconds);
        self
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ContentflowError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ContentflowError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks the parts serde cannot.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        check_timeout("confirmation_timeout_seconds", self.confirmation_timeout_seconds)?;
        check_timeout("worker_timeout_seconds", self.worker_timeout_seconds)?;
        self.automation_policy().map(|_| ())
    }

    /// Builds the automation policy.
    pub fn automation_policy(&self) -> Result<AutomationPolicy, ConfigurationError> {
        if let Some(stage) = self.automation.auto_stages.iter().find(|s| !s.is_real()) {
            return Err(ConfigurationError::new(format!(
                "'{stage}' is a pseudo-stage and cannot be automatic"
            ))
            .with_field("automation.auto_stages"));
        }
        AutomationPolicy::new(self.automation.mode, &self.automation.auto_stages)
            .map_err(|v| ConfigurationError::new(v.message).with_field("automation"))
    }

    /// The confirmation timeout, if any.
    #[must_use]
    pub fn confirmation_timeout(&self) -> Option<Duration> {
        self.confirmation_timeout_seconds.and_then(timeout_duration)
    }

    /// The worker timeout, if any.
    #[must_use]
    pub fn worker_timeout(&self) -> Option<Duration> {
        self.worker_timeout_seconds.and_then(timeout_duration)
    }
}

/// Positive and representable as a [`Duration`], or nothing.
fn timeout_duration(seconds: f64) -> Option<Duration> {
    if seconds <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(seconds).ok()
}

fn check_timeout(field: &str, seconds: Option<f64>) -> Result<(), ConfigurationError> {
    match seconds {
        Some(s) if timeout_duration(s).is_none() => Err(ConfigurationError::new(format!(
            "timeout must be a positive number of seconds no larger than {}, got {s}",
            Duration::MAX.as_secs()
        ))
        .with_field(field)),
        _ => Ok(()),
    }
}

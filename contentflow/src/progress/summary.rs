//! Read-only progress snapshots.

use super::ErrorEntry;
use crate::core::{Stage, StageStatus};
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Detail for one real stage inside a [`ProgressSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDetail {
    /// The stage.
    pub stage: Stage,
    /// Its status (`Pending` if not yet reached).
    pub status: StageStatus,
    /// Its configured weight.
    pub weight: f64,
    /// Work units expected.
    pub total_items: u32,
    /// Work units done.
    pub completed_items: u32,
    /// Quality signal reported by the worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_score: Option<f64>,
    /// Non-fatal errors reported for the stage.
    pub error_count: u32,
    /// When the stage started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Timestamp>,
    /// When the stage finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
    /// Seconds spent in the stage so far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

/// An owned snapshot of a run's progress, safe to hand to any transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    /// Run id.
    pub run_id: Uuid,
    /// The stage the run is at.
    pub current_stage: Stage,
    /// Status of the current stage.
    pub stage_status: StageStatus,
    /// Weighted completion in `[0, 100]`.
    pub progress_percentage: f64,
    /// Seconds since the run started (until it finished, if it has).
    pub duration_seconds: f64,
    /// Running count of non-fatal worker errors.
    pub total_errors: u32,
    /// When the run started.
    pub started_at: Timestamp,
    /// When the run finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    /// The run's error log.
    pub error_log: Vec<ErrorEntry>,
    /// Per-stage detail for every real stage, in stage order.
    pub stages: Vec<StageDetail>,
}

impl ProgressSummary {
    /// Returns true if the run reached `Completed` or `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.current_stage.is_terminal()
    }

    /// Returns true if the run is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.current_stage == Stage::Paused
    }

    /// Returns the detail for one stage.
    #[must_use]
    pub fn stage(&self, stage: Stage) -> Option<&StageDetail> {
        self.stages.iter().find(|d| d.stage == stage)
    }

    /// Converts to a JSON value.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

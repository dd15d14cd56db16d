//! The production run aggregate.

use crate::core::{Stage, StageRunRecord, StageStatus};
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One entry of a run's error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// The stage the error belongs to.
    pub stage: Stage,
    /// The error message.
    pub message: String,
    /// When the error was recorded.
    pub timestamp: Timestamp,
}

/// What `pause` replaced, so `resume` can restore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PauseSnapshot {
    pub(crate) previous_stage: Stage,
    pub(crate) paused_stage: Option<Stage>,
}

/// One end-to-end execution of the pipeline for a single content item.
///
/// The run is owned by its [`ProgressTracker`](super::ProgressTracker);
/// everything else only ever sees shared references or clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionRun {
    /// Run id.
    pub id: Uuid,
    /// The stage the run is currently at.
    pub current_stage: Stage,
    /// When the run was created.
    pub started_at: Timestamp,
    /// When the run reached `Completed` or `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    /// Errors in the order they were recorded.
    #[serde(default)]
    pub error_log: Vec<ErrorEntry>,
    /// Per-stage records, created lazily as the run advances.
    pub stage_records: BTreeMap<Stage, StageRunRecord>,
    /// Running count of non-fatal errors reported by workers.
    #[serde(default)]
    pub total_errors: u32,
    #[serde(skip)]
    pub(crate) pause_snapshot: Option<PauseSnapshot>,
}

impl ProductionRun {
    /// Creates a run positioned at the first stage.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        let first = Stage::REAL[0];
        let mut stage_records = BTreeMap::new();
        stage_records.insert(first, StageRunRecord::pending());

        Self {
            id,
            current_stage: first,
            started_at: now_utc(),
            completed_at: None,
            error_log: Vec::new(),
            stage_records,
            total_errors: 0,
            pause_snapshot: None,
        }
    }

    /// Returns the record for a stage, if it has been initialized.
    #[must_use]
    pub fn record(&self, stage: Stage) -> Option<&StageRunRecord> {
        self.stage_records.get(&stage)
    }

    /// Returns the status of a stage, `Pending` if not yet reached.
    #[must_use]
    pub fn status_of(&self, stage: Stage) -> StageStatus {
        self.record(stage).map_or(StageStatus::Pending, |r| r.status)
    }

    /// Returns true once the run reached `Completed` or `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.current_stage.is_terminal()
    }

    /// Error log entries for one stage.
    pub fn errors_for(&self, stage: Stage) -> impl Iterator<Item = &ErrorEntry> {
        self.error_log.iter().filter(move |e| e.stage == stage)
    }
}

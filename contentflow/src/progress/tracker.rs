//! The per-run progress state machine.

use super::run::PauseSnapshot;
use super::{ErrorEntry, ProductionRun, ProgressSummary, StageDetail, StageWeights};
use crate::core::{Stage, StageRunRecord, StageStatus};
use crate::errors::{codes, ContentflowError, ContractViolation};
use crate::events::{StatusEvent, StatusEventKind, StatusSink};
use crate::utils::{now_utc, seconds_between};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Owns one [`ProductionRun`] and exposes its legal state transitions.
///
/// Every mutating method checks its precondition and returns a
/// [`ContractViolation`] instead of silently repairing state. Once the run
/// is `Completed` or `Failed` only read access remains valid.
pub struct ProgressTracker {
    run: ProductionRun,
    weights: StageWeights,
    sink: Arc<dyn StatusSink>,
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("run_id", &self.run.id)
            .field("current_stage", &self.run.current_stage)
            .finish_non_exhaustive()
    }
}

impl ProgressTracker {
    /// Creates a tracker for a fresh run.
    #[must_use]
    pub fn new(run_id: Uuid, weights: StageWeights, sink: Arc<dyn StatusSink>) -> Self {
        Self {
            run: ProductionRun::new(run_id),
            weights,
            sink,
        }
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run.id
    }

    /// Returns the run aggregate.
    #[must_use]
    pub fn run(&self) -> &ProductionRun {
        &self.run
    }

    /// Returns the stage the run is at.
    #[must_use]
    pub fn current_stage(&self) -> Stage {
        self.run.current_stage
    }

    /// Returns the record for a stage, if initialized.
    #[must_use]
    pub fn record(&self, stage: Stage) -> Option<&StageRunRecord> {
        self.run.record(stage)
    }

    /// Returns true once the run is `Completed` or `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.run.is_terminal()
    }

    /// Returns true while the run is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.run.current_stage == Stage::Paused
    }

    /// The real stage that is started but not finished, if any.
    #[must_use]
    pub fn active_stage(&self) -> Option<Stage> {
        Stage::REAL
            .into_iter()
            .find(|s| self.run.status_of(*s).is_active())
    }

    /// Marks a stage as running with `total_items` expected work units.
    ///
    /// Fails if the run is terminal or paused, if the stage is a
    /// pseudo-stage, if an earlier stage is not completed, or if the stage
    /// already left `Pending` (starting twice is a violation).
    pub fn start_stage(&mut self, stage: Stage, total_items: u32) -> Result<(), ContentflowError> {
        self.ensure_not_terminal("start_stage")?;
        if self.is_paused() {
            return Err(ContractViolation::new(
                codes::RUN_PAUSED,
                format!("cannot start '{stage}' while the run is paused"),
            )
            .with_stage(stage)
            .into());
        }
        ensure_real(stage, "start_stage")?;

        if let Some(blocking) = stage
            .predecessors()
            .iter()
            .find(|s| self.run.status_of(**s) != StageStatus::Completed)
        {
            return Err(ContractViolation::new(
                codes::STAGE_ORDER,
                format!("cannot start '{stage}' before '{blocking}' is completed"),
            )
            .with_stage(stage)
            .with_context_entry("blocking_stage", blocking)
            .into());
        }

        let status = self.run.status_of(stage);
        if status != StageStatus::Pending {
            return Err(status_violation(stage, "start_stage", StageStatus::Pending, status).into());
        }

        let record = self.run.stage_records.entry(stage).or_default();
        record.status = StageStatus::InProgress;
        record.start_time = Some(now_utc());
        record.end_time = None;
        record.total_items = total_items;
        record.completed_items = 0;
        self.run.current_stage = stage;

        debug!(run_id = %self.run.id, stage = %stage, total_items, "Stage started");
        self.notify(
            StatusEventKind::StageStarted,
            stage,
            json!({ "total_items": total_items }),
        );
        Ok(())
    }

    /// Merges worker-reported counters into a running stage.
    ///
    /// `completed_items` is absolute and monotonic; `error_count` is added
    /// to both the stage and the run totals.
    pub fn update_progress(
        &mut self,
        stage: Stage,
        completed_items: u32,
        average_score: f64,
        error_count: u32,
    ) -> Result<(), ContentflowError> {
        self.ensure_not_terminal("update_progress")?;
        if !average_score.is_finite() || !(0.0..=1.0).contains(&average_score) {
            return Err(ContractViolation::new(
                codes::SCORE,
                format!("score for '{stage}' must be within [0, 1], got {average_score}"),
            )
            .with_stage(stage)
            .into());
        }

        let record = self.in_progress_record(stage, "update_progress")?;
        if completed_items < record.completed_items {
            return Err(ContractViolation::new(
                codes::COUNTER,
                format!(
                    "completed_items for '{stage}' cannot decrease from {} to {completed_items}",
                    record.completed_items
                ),
            )
            .with_stage(stage)
            .into());
        }
        if completed_items > record.total_items {
            return Err(ContractViolation::new(
                codes::COUNTER,
                format!(
                    "completed_items for '{stage}' exceeds total_items ({completed_items} > {})",
                    record.total_items
                ),
            )
            .with_stage(stage)
            .into());
        }

        record.completed_items = completed_items;
        record.average_score = Some(average_score);
        record.error_count = record.error_count.saturating_add(error_count);
        let total_items = record.total_items;
        self.run.total_errors = self.run.total_errors.saturating_add(error_count);

        self.notify(
            StatusEventKind::StageProgress,
            stage,
            json!({
                "completed_items": completed_items,
                "total_items": total_items,
                "average_score": average_score,
                "error_count": error_count,
            }),
        );
        Ok(())
    }

    /// Finishes a running stage and moves the run to the next one.
    ///
    /// After the last real stage the run stays on `ArticleReview` until
    /// [`complete`](Self::complete) is called.
    pub fn complete_stage(&mut self, stage: Stage) -> Result<(), ContentflowError> {
        self.ensure_not_terminal("complete_stage")?;
        let record = self.in_progress_record(stage, "complete_stage")?;
        record.status = StageStatus::Completed;
        record.end_time = Some(now_utc());

        if let Some(next) = stage.next() {
            self.run.stage_records.entry(next).or_default();
            self.run.current_stage = next;
        }

        debug!(run_id = %self.run.id, stage = %stage, "Stage completed");
        self.notify(StatusEventKind::StageCompleted, stage, json!({}));
        Ok(())
    }

    /// Appends an entry to the error log without touching stage status.
    pub fn add_error(&mut self, stage: Stage, message: impl Into<String>) -> Result<(), ContentflowError> {
        self.ensure_not_terminal("add_error")?;
        let message = message.into();
        self.notify(
            StatusEventKind::StageError,
            stage,
            json!({ "message": message }),
        );
        self.run.error_log.push(ErrorEntry {
            stage,
            message,
            timestamp: now_utc(),
        });
        Ok(())
    }

    /// Marks the whole run as completed. Terminal.
    ///
    /// Every real stage must already be completed.
    pub fn complete(&mut self) -> Result<(), ContentflowError> {
        self.ensure_not_terminal("complete")?;
        if self.is_paused() {
            return Err(ContractViolation::new(
                codes::RUN_PAUSED,
                "cannot complete a paused run",
            )
            .into());
        }
        if let Some(open) = Stage::REAL
            .into_iter()
            .find(|s| self.run.status_of(*s) != StageStatus::Completed)
        {
            return Err(ContractViolation::new(
                codes::STAGE_ORDER,
                format!("cannot complete the run while '{open}' is not completed"),
            )
            .with_stage(open)
            .into());
        }

        self.finish(Stage::Completed, StageStatus::Completed);
        self.notify(StatusEventKind::RunCompleted, Stage::Completed, json!({}));
        Ok(())
    }

    /// Marks the whole run as failed. Terminal.
    ///
    /// A running or paused stage is marked failed along with the run.
    pub fn fail(&mut self) -> Result<(), ContentflowError> {
        self.ensure_not_terminal("fail")?;
        let now = now_utc();
        for record in self.run.stage_records.values_mut() {
            if record.status.is_active() {
                record.status = StageStatus::Failed;
                record.end_time = Some(now);
            }
        }

        self.finish(Stage::Failed, StageStatus::Failed);
        self.notify(
            StatusEventKind::RunFailed,
            Stage::Failed,
            json!({ "errors": self.run.error_log.len() }),
        );
        Ok(())
    }

    /// Suspends the run. Returns false if nothing changed.
    ///
    /// The running stage, if any, moves to `Paused`; the previous position
    /// is kept so [`resume`](Self::resume) can restore it.
    pub fn pause(&mut self) -> bool {
        if self.is_terminal() || self.is_paused() {
            return false;
        }

        let paused_stage = Stage::REAL
            .into_iter()
            .find(|s| self.run.status_of(*s) == StageStatus::InProgress);
        if let Some(stage) = paused_stage {
            if let Some(record) = self.run.stage_records.get_mut(&stage) {
                record.status = StageStatus::Paused;
            }
        }

        self.run.pause_snapshot = Some(PauseSnapshot {
            previous_stage: self.run.current_stage,
            paused_stage,
        });
        self.run.current_stage = Stage::Paused;

        self.notify(
            StatusEventKind::RunPaused,
            Stage::Paused,
            json!({ "paused_stage": paused_stage }),
        );
        true
    }

    /// Restores the state captured by [`pause`](Self::pause). Returns false
    /// if nothing changed.
    pub fn resume(&mut self) -> bool {
        if self.is_terminal() || !self.is_paused() {
            return false;
        }
        let Some(snapshot) = self.run.pause_snapshot.take() else {
            return false;
        };

        if let Some(stage) = snapshot.paused_stage {
            if let Some(record) = self.run.stage_records.get_mut(&stage) {
                if record.status == StageStatus::Paused {
                    record.status = StageStatus::InProgress;
                }
            }
        }
        self.run.current_stage = snapshot.previous_stage;

        self.notify(
            StatusEventKind::RunResumed,
            snapshot.previous_stage,
            json!({}),
        );
        true
    }

    /// Seconds from start until completion, or until now if still running.
    #[must_use]
    pub fn duration(&self) -> f64 {
        seconds_between(
            self.run.started_at,
            self.run.completed_at.unwrap_or_else(now_utc),
        )
    }

    /// Weighted completion percentage in `[0, 100]`.
    ///
    /// Completed stages count in full, running or paused (and failed)
    /// stages by their completed fraction, unreached stages not at all.
    #[must_use]
    pub fn progress_percentage(&self) -> f64 {
        let total: f64 = Stage::REAL
            .into_iter()
            .map(|stage| {
                let weight = self.weights.weight(stage);
                match self.run.record(stage) {
                    Some(r) if r.status == StageStatus::Completed => weight,
                    Some(r) if r.status != StageStatus::Pending => weight * r.fraction_complete(),
                    _ => 0.0,
                }
            })
            .sum();
        total.clamp(0.0, 100.0)
    }

    /// Takes an owned snapshot of the run.
    #[must_use]
    pub fn summary(&self) -> ProgressSummary {
        let stage_status = if self.is_paused() {
            StageStatus::Paused
        } else {
            self.run.status_of(self.run.current_stage)
        };

        let stages = Stage::REAL
            .into_iter()
            .map(|stage| {
                let record = self.run.record(stage).cloned().unwrap_or_default();
                StageDetail {
                    stage,
                    status: record.status,
                    weight: self.weights.weight(stage),
                    total_items: record.total_items,
                    completed_items: record.completed_items,
                    average_score: record.average_score,
                    error_count: record.error_count,
                    start_time: record.start_time,
                    end_time: record.end_time,
                    duration_seconds: record.duration_seconds(),
                }
            })
            .collect();

        ProgressSummary {
            run_id: self.run.id,
            current_stage: self.run.current_stage,
            stage_status,
            progress_percentage: self.progress_percentage(),
            duration_seconds: self.duration(),
            total_errors: self.run.total_errors,
            started_at: self.run.started_at,
            completed_at: self.run.completed_at,
            error_log: self.run.error_log.clone(),
            stages,
        }
    }

    fn finish(&mut self, terminal: Stage, status: StageStatus) {
        self.run.pause_snapshot = None;
        self.run.current_stage = terminal;
        self.run
            .stage_records
            .insert(terminal, StageRunRecord::finished(status));
        self.run.completed_at = Some(now_utc());
        debug!(run_id = %self.run.id, outcome = %terminal, "Run finished");
    }

    fn ensure_not_terminal(&self, operation: &str) -> Result<(), ContractViolation> {
        if self.is_terminal() {
            return Err(ContractViolation::new(
                codes::RUN_TERMINAL,
                format!(
                    "{operation} called on run {} which is already '{}'",
                    self.run.id, self.run.current_stage
                ),
            )
            .with_context_entry("operation", operation));
        }
        Ok(())
    }

    fn in_progress_record(
        &mut self,
        stage: Stage,
        operation: &str,
    ) -> Result<&mut StageRunRecord, ContractViolation> {
        ensure_real(stage, operation)?;
        let status = self.run.status_of(stage);
        if status != StageStatus::InProgress {
            return Err(status_violation(stage, operation, StageStatus::InProgress, status));
        }
        self.run
            .stage_records
            .get_mut(&stage)
            .ok_or_else(|| status_violation(stage, operation, StageStatus::InProgress, status))
    }

    fn notify(&self, kind: StatusEventKind, stage: Stage, data: serde_json::Value) {
        self.sink
            .try_emit(StatusEvent::new(self.run.id, kind, stage).with_data(data));
    }
}

fn ensure_real(stage: Stage, operation: &str) -> Result<(), ContractViolation> {
    if stage.is_real() {
        Ok(())
    } else {
        Err(ContractViolation::new(
            codes::NOT_REAL_STAGE,
            format!("{operation} requires a real stage, got '{stage}'"),
        )
        .with_stage(stage))
    }
}

fn status_violation(
    stage: Stage,
    operation: &str,
    expected: StageStatus,
    actual: StageStatus,
) -> ContractViolation {
    ContractViolation::new(
        codes::STAGE_STATUS,
        format!("{operation} requires '{stage}' to be {expected}, but it is {actual}"),
    )
    .with_stage(stage)
    .with_context_entry("expected", expected)
    .with_context_entry("actual", actual)
}

//! The persistence collaborator.
//!
//! The orchestrator reports status changes and terminal runs to a
//! [`RunStore`]. Store failures are logged by the caller and never roll back
//! in-memory state.

use crate::errors::PersistenceError;
use crate::progress::ProductionRun;
use crate::utils::{now_utc, Timestamp};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status reported to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The run is executing stages.
    Running,
    /// The run is paused.
    Paused,
    /// The run finished every stage.
    Completed,
    /// A stage failed.
    Failed,
    /// The run was cancelled.
    Cancelled,
}

impl RunStatus {
    /// Returns the snake_case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns true for statuses a run never leaves.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where run status and finished runs are recorded.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Records a run that reached `Completed` or `Failed`.
    async fn save_terminal_run(&self, run: &ProductionRun) -> Result<(), PersistenceError>;

    /// Records a status change.
    async fn update_status(&self, run_id: Uuid, status: RunStatus) -> Result<(), PersistenceError>;
}

/// A store that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpRunStore;

#[async_trait]
impl RunStore for NoOpRunStore {
    async fn save_terminal_run(&self, _run: &ProductionRun) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn update_status(&self, _run_id: Uuid, _status: RunStatus) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// A status change as recorded by [`InMemoryRunStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// The new status.
    pub status: RunStatus,
    /// When it was recorded.
    pub recorded_at: Timestamp,
}

/// A store that keeps everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    history: DashMap<Uuid, Vec<StatusChange>>,
    runs: DashMap<Uuid, ProductionRun>,
}

impl InMemoryRunStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the saved terminal run.
    #[must_use]
    pub fn terminal_run(&self, run_id: Uuid) -> Option<ProductionRun> {
        self.runs.get(&run_id).map(|r| r.clone())
    }

    /// Returns the status history of a run, oldest first.
    #[must_use]
    pub fn history(&self, run_id: Uuid) -> Vec<RunStatus> {
        self.history
            .get(&run_id)
            .map(|changes| changes.iter().map(|c| c.status).collect())
            .unwrap_or_default()
    }

    /// Returns the last recorded status of a run.
    #[must_use]
    pub fn latest_status(&self, run_id: Uuid) -> Option<RunStatus> {
        self.history
            .get(&run_id)
            .and_then(|changes| changes.last().map(|c| c.status))
    }

    /// Returns the number of saved terminal runs.
    #[must_use]
    pub fn terminal_count(&self) -> usize {
        self.runs.len()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn save_terminal_run(&self, run: &ProductionRun) -> Result<(), PersistenceError> {
        if !run.is_terminal() {
            return Err(PersistenceError::new(
                "save_terminal_run",
                run.id,
                format!("run is still at '{}'", run.current_stage),
            ));
        }
        self.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn update_status(&self, run_id: Uuid, status: RunStatus) -> Result<(), PersistenceError> {
        self.history.entry(run_id).or_default().push(StatusChange {
            status,
            recorded_at: now_utc(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Stage;

    #[tokio::test]
    async fn test_in_memory_history() {
        let store = InMemoryRunStore::new();
        let run_id = Uuid::new_v4();

        store.update_status(run_id, RunStatus::Running).await.unwrap();
        store.update_status(run_id, RunStatus::Paused).await.unwrap();
        store.update_status(run_id, RunStatus::Running).await.unwrap();

        assert_eq!(
            store.history(run_id),
            vec![RunStatus::Running, RunStatus::Paused, RunStatus::Running]
        );
        assert_eq!(store.latest_status(run_id), Some(RunStatus::Running));
        assert!(store.history(Uuid::new_v4()).is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_rejects_active_run() {
        let store = InMemoryRunStore::new();
        let run = ProductionRun::new(Uuid::new_v4());

        let err = store.save_terminal_run(&run).await.unwrap_err();
        assert_eq!(err.operation, "save_terminal_run");
        assert_eq!(store.terminal_count(), 0);
    }

    #[tokio::test]
    async fn test_in_memory_saves_terminal_run() {
        let store = InMemoryRunStore::new();
        let mut run = ProductionRun::new(Uuid::new_v4());
        run.current_stage = Stage::Failed;

        tokio_test::assert_ok!(store.save_terminal_run(&run).await);
        assert_eq!(store.terminal_run(run.id).unwrap().current_stage, Stage::Failed);
    }

    #[test]
    fn test_status_flags() {
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(!RunStatus::Paused.is_terminal());
        assert_eq!(RunStatus::Completed.to_string(), "completed");
    }
}

//! Stage status enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution status of one stage within a production run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not started yet.
    #[default]
    Pending,
    /// Stage is currently running.
    InProgress,
    /// Stage completed successfully.
    Completed,
    /// Stage failed.
    Failed,
    /// Stage was suspended by an orchestrator-level pause.
    Paused,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the stage has started but not finished.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress | Self::Paused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_status_display() {
        assert_eq!(StageStatus::Pending.to_string(), "pending");
        assert_eq!(StageStatus::InProgress.to_string(), "in_progress");
        assert_eq!(StageStatus::Paused.to_string(), "paused");
    }

    #[test]
    fn test_stage_status_is_terminal() {
        assert!(StageStatus::Completed.is_terminal());
        assert!(StageStatus::Failed.is_terminal());
        assert!(!StageStatus::Pending.is_terminal());
        assert!(!StageStatus::InProgress.is_terminal());
        assert!(!StageStatus::Paused.is_terminal());
    }

    #[test]
    fn test_stage_status_is_active() {
        assert!(StageStatus::InProgress.is_active());
        assert!(StageStatus::Paused.is_active());
        assert!(!StageStatus::Completed.is_active());
    }

    #[test]
    fn test_stage_status_serialize() {
        let json = serde_json::to_string(&StageStatus::InProgress).unwrap();
        assert_eq!(json, r#""in_progress""#);

        let deserialized: StageStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, StageStatus::InProgress);
    }
}

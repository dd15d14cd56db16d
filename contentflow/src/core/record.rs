//! Per-stage run record.

use super::StageStatus;
use crate::utils::{now_utc, seconds_between, Timestamp};
use serde::{Deserialize, Serialize};

/// Counters, timestamps, and status for one stage of one production run.
///
/// Records are only mutated through the progress tracker, which enforces
/// `completed_items <= total_items` and the legal status transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRunRecord {
    /// Current status.
    pub status: StageStatus,
    /// When the stage started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Timestamp>,
    /// When the stage finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Timestamp>,
    /// Work units expected.
    pub total_items: u32,
    /// Work units done so far.
    pub completed_items: u32,
    /// Quality signal reported by the worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_score: Option<f64>,
    /// Non-fatal errors reported for this stage.
    pub error_count: u32,
}

impl Default for StageRunRecord {
    fn default() -> Self {
        Self::pending()
    }
}

impl StageRunRecord {
    /// Creates a record for a stage that has not started.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: StageStatus::Pending,
            start_time: None,
            end_time: None,
            total_items: 1,
            completed_items: 0,
            average_score: None,
            error_count: 0,
        }
    }

    /// Creates a record already marked with the given terminal status.
    #[must_use]
    pub(crate) fn finished(status: StageStatus) -> Self {
        let now = now_utc();
        Self {
            status,
            start_time: Some(now),
            end_time: Some(now),
            ..Self::pending()
        }
    }

    /// Fraction of expected work done, in `[0, 1]`.
    ///
    /// A stage expecting zero units reports zero until it completes.
    #[must_use]
    pub fn fraction_complete(&self) -> f64 {
        if self.total_items == 0 {
            return 0.0;
        }
        (f64::from(self.completed_items) / f64::from(self.total_items)).min(1.0)
    }

    /// Seconds spent in the stage, if it has started.
    #[must_use]
    pub fn duration_seconds(&self) -> Option<f64> {
        self.start_time
            .map(|start| seconds_between(start, self.end_time.unwrap_or_else(now_utc)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_defaults() {
        let record = StageRunRecord::pending();
        assert_eq!(record.status, StageStatus::Pending);
        assert_eq!(record.total_items, 1);
        assert_eq!(record.completed_items, 0);
        assert!(record.average_score.is_none());
        assert!(record.duration_seconds().is_none());
    }

    #[test]
    fn test_fraction_complete() {
        let record = StageRunRecord {
            total_items: 4,
            completed_items: 1,
            ..StageRunRecord::pending()
        };
        assert!((record.fraction_complete() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fraction_complete_zero_total() {
        let record = StageRunRecord {
            total_items: 0,
            ..StageRunRecord::pending()
        };
        assert_eq!(record.fraction_complete(), 0.0);
    }

    #[test]
    fn test_finished_record_has_times() {
        let record = StageRunRecord::finished(StageStatus::Completed);
        assert!(record.start_time.is_some());
        assert!(record.end_time.is_some());
        assert!(record.duration_seconds().is_some());
    }
}

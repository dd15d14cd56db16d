//! Registry of live production runs.

use crate::cancellation::RunControl;
use crate::errors::ContentflowError;
use crate::progress::{ProgressSummary, ProgressTracker};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Everything the orchestrator keeps for one run.
///
/// The tracker lock is only ever held for a synchronous transition, never
/// across an `.await`.
#[derive(Debug)]
pub struct RunEntry {
    tracker: Mutex<ProgressTracker>,
    control: RunControl,
    summaries: watch::Sender<ProgressSummary>,
}

impl RunEntry {
    /// Wraps a fresh tracker.
    #[must_use]
    pub fn new(tracker: ProgressTracker) -> Self {
        let (summaries, _) = watch::channel(tracker.summary());
        Self {
            tracker: Mutex::new(tracker),
            control: RunControl::new(),
            summaries,
        }
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.tracker.lock().run_id()
    }

    /// Returns the run's control signals.
    #[must_use]
    pub fn control(&self) -> &RunControl {
        &self.control
    }

    /// Applies a transition and publishes the resulting snapshot to
    /// subscribers before releasing the lock.
    pub fn with_tracker<R>(&self, f: impl FnOnce(&mut ProgressTracker) -> R) -> R {
        let mut tracker = self.tracker.lock();
        let result = f(&mut tracker);
        self.summaries.send_replace(tracker.summary());
        result
    }

    /// Reads the tracker without publishing.
    pub fn inspect<R>(&self, f: impl FnOnce(&ProgressTracker) -> R) -> R {
        f(&self.tracker.lock())
    }

    /// Takes a fresh snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSummary {
        self.tracker.lock().summary()
    }

    /// Returns a receiver of published snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProgressSummary> {
        self.summaries.subscribe()
    }

    /// Returns true once the run is `Completed` or `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.tracker.lock().is_terminal()
    }
}

/// Live runs by id.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: DashMap<Uuid, Arc<RunEntry>>,
}

impl RunRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a run.
    pub fn insert(&self, entry: RunEntry) -> Arc<RunEntry> {
        let entry = Arc::new(entry);
        self.runs.insert(entry.run_id(), Arc::clone(&entry));
        entry
    }

    /// Looks up a run.
    pub fn get(&self, run_id: Uuid) -> Result<Arc<RunEntry>, ContentflowError> {
        self.runs
            .get(&run_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(ContentflowError::RunNotFound(run_id))
    }

    /// Removes a run.
    pub fn remove(&self, run_id: Uuid) -> Option<Arc<RunEntry>> {
        self.runs.remove(&run_id).map(|(_, entry)| entry)
    }

    /// Returns the ids of all registered runs.
    #[must_use]
    pub fn ids(&self) -> Vec<Uuid> {
        self.runs.iter().map(|entry| *entry.key()).collect()
    }

    /// Returns the number of runs that are not terminal.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.runs.iter().filter(|entry| !entry.is_terminal()).count()
    }

    /// Returns the number of registered runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Returns true if no runs are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Stage;
    use crate::events::NoOpStatusSink;
    use crate::progress::StageWeights;

    fn entry() -> RunEntry {
        let weights = StageWeights::from_percentages([10.0, 20.0, 40.0, 15.0, 15.0]).unwrap();
        RunEntry::new(ProgressTracker::new(
            Uuid::new_v4(),
            weights,
            Arc::new(NoOpStatusSink),
        ))
    }

    #[test]
    fn test_insert_get_remove() {
        let registry = RunRegistry::new();
        let entry = registry.insert(entry());
        let id = entry.run_id();

        assert_eq!(registry.get(id).unwrap().run_id(), id);
        assert_eq!(registry.ids(), vec![id]);
        assert_eq!(registry.active_count(), 1);

        assert!(registry.remove(id).is_some());
        assert!(matches!(
            registry.get(id).unwrap_err(),
            ContentflowError::RunNotFound(missing) if missing == id
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_with_tracker_publishes() {
        let entry = entry();
        let mut rx = entry.subscribe();
        assert_eq!(rx.borrow().current_stage, Stage::TopicDiscovery);

        entry
            .with_tracker(|t| t.start_stage(Stage::TopicDiscovery, 2))
            .unwrap();
        assert!(rx.has_changed().unwrap());
        let summary = rx.borrow_and_update().clone();
        assert_eq!(summary.stage_status, crate::core::StageStatus::InProgress);
    }

    #[test]
    fn test_active_count_skips_terminal() {
        let registry = RunRegistry::new();
        let done = registry.insert(entry());
        registry.insert(entry());
        done.with_tracker(|t| t.fail()).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.active_count(), 1);
    }
}

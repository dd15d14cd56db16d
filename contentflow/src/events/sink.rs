//! Status sink trait and implementations.

use crate::core::Stage;
use crate::utils::{now_utc, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, Level};
use uuid::Uuid;

/// What happened to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusEventKind {
    /// A stage started.
    StageStarted,
    /// A stage reported progress.
    StageProgress,
    /// A stage completed.
    StageCompleted,
    /// An error was logged for a stage.
    StageError,
    /// The run was paused.
    RunPaused,
    /// The run was resumed.
    RunResumed,
    /// The run completed.
    RunCompleted,
    /// The run failed or was cancelled.
    RunFailed,
}

impl StatusEventKind {
    /// Dotted event name, e.g. `stage.started`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StageStarted => "stage.started",
            Self::StageProgress => "stage.progress",
            Self::StageCompleted => "stage.completed",
            Self::StageError => "stage.error",
            Self::RunPaused => "run.paused",
            Self::RunResumed => "run.resumed",
            Self::RunCompleted => "run.completed",
            Self::RunFailed => "run.failed",
        }
    }
}

impl fmt::Display for StatusEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single status notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// The run the event belongs to.
    pub run_id: Uuid,
    /// What happened.
    pub kind: StatusEventKind,
    /// The stage involved.
    pub stage: Stage,
    /// When it happened.
    pub timestamp: Timestamp,
    /// Event-specific payload.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl StatusEvent {
    /// Creates an event with an empty payload.
    #[must_use]
    pub fn new(run_id: Uuid, kind: StatusEventKind, stage: Stage) -> Self {
        Self {
            run_id,
            kind,
            stage,
            timestamp: now_utc(),
            data: serde_json::Value::Null,
        }
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// Trait for observers of run status.
///
/// Sinks must tolerate arbitrary call frequency and never fail the caller.
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Delivers an event asynchronously.
    async fn emit(&self, event: StatusEvent) {
        self.try_emit(event);
    }

    /// Delivers an event without blocking. Errors are suppressed.
    fn try_emit(&self, event: StatusEvent);
}

/// A sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpStatusSink;

#[async_trait]
impl StatusSink for NoOpStatusSink {
    fn try_emit(&self, _event: StatusEvent) {}
}

/// A sink that logs events through `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingStatusSink {
    level: Level,
}

impl Default for LoggingStatusSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingStatusSink {
    /// Creates a logging sink at the given level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

#[async_trait]
impl StatusSink for LoggingStatusSink {
    fn try_emit(&self, event: StatusEvent) {
        if self.level == Level::DEBUG {
            debug!(
                run_id = %event.run_id,
                stage = %event.stage,
                data = %event.data,
                "Status: {}", event.kind
            );
        } else {
            info!(
                run_id = %event.run_id,
                stage = %event.stage,
                data = %event.data,
                "Status: {}", event.kind
            );
        }
    }
}

/// A sink that keeps every event, for tests and pull-style observers.
#[derive(Debug, Default)]
pub struct CollectingStatusSink {
    events: parking_lot::RwLock<Vec<StatusEvent>>,
}

impl CollectingStatusSink {
    /// Creates an empty collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.read().clone()
    }

    /// Returns the events of one kind.
    #[must_use]
    pub fn events_of_kind(&self, kind: StatusEventKind) -> Vec<StatusEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    /// Returns the events of one run.
    #[must_use]
    pub fn events_for_run(&self, run_id: Uuid) -> Vec<StatusEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.run_id == run_id)
            .cloned()
            .collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

#[async_trait]
impl StatusSink for CollectingStatusSink {
    fn try_emit(&self, event: StatusEvent) {
        self.events.write().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: StatusEventKind) -> StatusEvent {
        StatusEvent::new(Uuid::new_v4(), kind, Stage::TopicDiscovery)
    }

    #[tokio::test]
    async fn test_noop_sink() {
        let sink = NoOpStatusSink;
        sink.emit(event(StatusEventKind::StageStarted)).await;
        sink.try_emit(event(StatusEventKind::RunFailed));
    }

    #[tokio::test]
    async fn test_logging_sink() {
        let sink = LoggingStatusSink::default();
        sink.emit(event(StatusEventKind::StageStarted).with_data(serde_json::json!({"x": 1})))
            .await;
        LoggingStatusSink::debug().try_emit(event(StatusEventKind::StageProgress));
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingStatusSink::new();
        assert!(sink.is_empty());

        sink.emit(event(StatusEventKind::StageStarted)).await;
        sink.try_emit(event(StatusEventKind::StageCompleted));
        sink.try_emit(event(StatusEventKind::StageStarted));

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.events_of_kind(StatusEventKind::StageStarted).len(), 2);

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_collecting_sink_filters_by_run() {
        let sink = CollectingStatusSink::new();
        let run_id = Uuid::new_v4();
        sink.try_emit(StatusEvent::new(run_id, StatusEventKind::RunPaused, Stage::Paused));
        sink.try_emit(event(StatusEventKind::RunPaused));
        assert_eq!(sink.events_for_run(run_id).len(), 1);
    }

    #[test]
    fn test_event_kind_names() {
        assert_eq!(StatusEventKind::StageStarted.to_string(), "stage.started");
        assert_eq!(StatusEventKind::RunCompleted.as_str(), "run.completed");
        let json = serde_json::to_string(&StatusEventKind::RunFailed).unwrap();
        assert_eq!(json, r#""run_failed""#);
    }
}

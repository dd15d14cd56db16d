//! Status sinks for run observers.
//!
//! The tracker pushes a [`StatusEvent`] on every transition. Sinks are
//! handed to each orchestrator explicitly; there is no process-wide sink.

mod sink;

pub use sink::{
    CollectingStatusSink, LoggingStatusSink, NoOpStatusSink, StatusEvent, StatusEventKind,
    StatusSink,
};

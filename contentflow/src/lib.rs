//! # Contentflow
//!
//! A staged content production pipeline orchestrator.
//!
//! Contentflow moves a production run through a fixed sequence of stages
//! (topic discovery, topic research, article writing, style adaptation,
//! article review), handing each one to an external worker. It provides:
//!
//! - **Stage state machine**: strict ordering with contract checks on every transition
//! - **Weighted progress**: a configurable per-stage weight table
//! - **Run control**: pause, resume, and cancel at stage boundaries
//! - **Automation policy**: per-stage choice between automatic and human-confirmed
//! - **Failure bookkeeping**: an error log and a terminal snapshot for every run
//!
//! ## Quick Start
//!
//! ```rust
//! use contentflow::prelude::*;
//! use contentflow::testing::{default_config, static_workers};
//!
//! # tokio_test::block_on(async {
//! let orchestrator = PipelineOrchestrator::builder(default_config())
//!     .workers(static_workers())
//!     .build()?;
//!
//! let outcome = orchestrator
//!     .run(ProductionRequest::new().with_topic("wasm runtimes"))
//!     .await?;
//! assert!(outcome.summary.is_terminal());
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod automation;
pub mod cancellation;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod orchestrator;
pub mod persistence;
pub mod progress;
pub mod testing;
pub mod utils;
pub mod workers;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::automation::{AutomationMode, AutomationPolicy, ConfirmationGate};
    pub use crate::cancellation::{CancellationToken, RunControl};
    pub use crate::core::{Stage, StageRunRecord, StageStatus};
    pub use crate::errors::{
        ConfigurationError, ContentflowError, ContractViolation, PersistenceError, RunError,
        WorkerError,
    };
    pub use crate::events::{LoggingStatusSink, NoOpStatusSink, StatusEvent, StatusSink};
    pub use crate::orchestrator::{
        ControlOutcome, OrchestratorConfig, PipelineOrchestrator, ProductionOutcome, ProductionRequest,
        RunHandle,
    };
    pub use crate::persistence::{InMemoryRunStore, RunStatus, RunStore};
    pub use crate::progress::{ProgressSummary, ProgressTracker, StageWeights};
    pub use crate::utils::{iso_timestamp, Timestamp};
    pub use crate::workers::{
        FnWorker, StageInput, Worker, WorkerContext, WorkerOutput, WorkerRegistry,
    };
}

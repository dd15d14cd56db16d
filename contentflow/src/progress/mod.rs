//! Progress tracking for production runs.
//!
//! This module provides:
//! - Validated per-stage weights
//! - The `ProductionRun` aggregate and its error log
//! - The `ProgressTracker` state machine
//! - Serializable progress summaries

mod run;
mod summary;
mod tracker;
mod weights;

pub use run::{ErrorEntry, ProductionRun};
pub use summary::{ProgressSummary, StageDetail};
pub use tracker::ProgressTracker;
pub use weights::StageWeights;

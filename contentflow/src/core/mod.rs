//! Core domain model types for contentflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - The stage catalog with its fixed production order
//! - Per-stage status enum
//! - The per-stage run record

mod record;
mod stage;
mod status;

pub use record::StageRunRecord;
pub use stage::{ParseStageError, Stage};
pub use status::StageStatus;

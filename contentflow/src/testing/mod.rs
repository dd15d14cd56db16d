//! Testing utilities for production pipelines.
//!
//! This module provides:
//! - Mock workers with fixed, failing, slow, and recording behavior
//! - Fixtures for weights, configuration, and worker registries

mod fixtures;
mod mocks;

pub use fixtures::{default_config, default_weights, registry_with, static_workers};
pub use mocks::{FailingWorker, RecordedCall, RecordingWorker, SlowWorker, StaticWorker};

//! The pipeline orchestrator.
//!
//! This module provides:
//! - `OrchestratorConfig`, the validated configuration
//! - `ProductionRequest` and `ProductionOutcome`, what goes in and comes out
//! - `RunRegistry`, the live runs by id
//! - `PipelineOrchestrator`, which drives runs through the stage catalog

mod config;
mod engine;
mod registry;
mod request;


pub use crate::errors::RunError;
pub use config::{AutomationConfig, OrchestratorConfig};
pub use engine::{ControlOutcome, OrchestratorBuilder, PipelineOrchestrator, RunHandle};
pub use registry::{RunEntry, RunRegistry};
pub use request::{ArticleRef, ArticleStatus, ProductionOutcome, ProductionRequest};

//! Cooperative cancellation and pause signals for production runs.
//!
//! This module provides:
//! - `CancellationToken`, a cloneable, awaitable cancel flag
//! - `RunControl`, the per-run pair of cancel and pause signals

mod control;
mod token;

pub use control::RunControl;
pub use token::CancellationToken;

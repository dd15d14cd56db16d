//! Per-stage automation policy and human confirmation.
//!
//! The policy decides whether a stage runs on its own; the gate is how a
//! human-assisted stage receives its go-ahead.

mod confirmation;
mod policy;

pub use confirmation::{ConfirmationDecision, ConfirmationGate, PendingConfirmation};
pub use policy::{AutomationMode, AutomationPolicy};

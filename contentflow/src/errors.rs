//! Error types for the contentflow crate.
//!
//! The taxonomy separates contract violations (orchestrator or caller bugs,
//! never retried), worker failures (terminate the run), persistence failures
//! (logged only), and invalid requests (rejected before a run exists).

use crate::core::Stage;
use crate::progress::ProgressSummary;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// The main error type for contentflow operations.
#[derive(Debug, Error)]
pub enum ContentflowError {
    /// A tracker or policy precondition was violated.
    #[error("{0}")]
    ContractViolation(#[from] ContractViolation),

    /// The production request was rejected before any stage started.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The orchestrator configuration is invalid.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A stage worker returned an error.
    #[error("Stage '{stage}' failed: {source}")]
    Worker {
        /// The stage whose worker failed.
        stage: Stage,
        /// The worker's error.
        #[source]
        source: WorkerError,
    },

    /// The run was cancelled.
    #[error("Production cancelled: {0}")]
    Cancelled(String),

    /// A human-assisted stage was rejected instead of confirmed.
    #[error("Confirmation rejected for stage '{stage}': {reason}")]
    ConfirmationRejected {
        /// The stage awaiting confirmation.
        stage: Stage,
        /// The reason given for the rejection.
        reason: String,
    },

    /// No confirmation arrived in time for a human-assisted stage.
    #[error("Confirmation for stage '{stage}' timed out after {timeout_seconds}s")]
    ConfirmationTimeout {
        /// The stage awaiting confirmation.
        stage: Stage,
        /// The timeout in seconds.
        timeout_seconds: f64,
    },

    /// No run with this id is registered.
    #[error("Production run not found: {0}")]
    RunNotFound(Uuid),

    /// The persistence collaborator failed.
    #[error("{0}")]
    Persistence(#[from] PersistenceError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ContentflowError {
    /// Returns true if the error is a contract violation.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ContractViolation(_))
    }

    /// Returns the contract violation code, if any.
    #[must_use]
    pub fn violation_code(&self) -> Option<&str> {
        match self {
            Self::ContractViolation(v) => Some(&v.code),
            _ => None,
        }
    }
}

/// Well-known contract violation codes.
pub mod codes {
    /// The run already reached `Completed` or `Failed`.
    pub const RUN_TERMINAL: &str = "TRACKER-001-TERMINAL";
    /// The run is paused.
    pub const RUN_PAUSED: &str = "TRACKER-002-PAUSED";
    /// A pseudo-stage was used where a real stage is required.
    pub const NOT_REAL_STAGE: &str = "TRACKER-003-PSEUDO_STAGE";
    /// The stage is not in the status the operation requires.
    pub const STAGE_STATUS: &str = "TRACKER-004-STATUS";
    /// An earlier stage has not completed yet.
    pub const STAGE_ORDER: &str = "TRACKER-005-ORDER";
    /// A progress counter moved backwards or overflowed its total.
    pub const COUNTER: &str = "TRACKER-006-COUNTER";
    /// A quality score fell outside `[0, 1]`.
    pub const SCORE: &str = "TRACKER-007-SCORE";
    /// An automation lookup named a stage outside the catalog.
    pub const POLICY_STAGE: &str = "POLICY-001-UNKNOWN_STAGE";
    /// No confirmation is pending for the run and stage.
    pub const NOT_PENDING: &str = "GATE-001-NOT_PENDING";
    /// The run is still active.
    pub const RUN_ACTIVE: &str = "ORCH-001-RUN_ACTIVE";
}

/// Error raised when a component is called outside its precondition.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("Contract violation [{code}]: {message}")]
pub struct ContractViolation {
    /// Error code (see [`codes`]).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// The stage involved, if any.
    pub stage: Option<Stage>,
    /// Hint for fixing the caller.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractViolation {
    /// Creates a new violation, filling the fix hint from the code.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let fix_hint = ContractSuggestions::get(&code).map(str::to_string);
        Self {
            code,
            message: message.into(),
            stage: None,
            fix_hint,
            context: HashMap::new(),
        }
    }

    /// Sets the stage involved.
    #[must_use]
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }
}

/// Provides default suggestions for contract violation codes.
pub struct ContractSuggestions;

impl ContractSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            codes::RUN_TERMINAL => Some(
                "The run already completed or failed. Start a new production \
                 run instead of mutating a finished one.",
            ),
            codes::RUN_PAUSED => Some("Resume the run before starting the next stage."),
            codes::STAGE_STATUS => Some(
                "Call start_stage before updating or completing a stage, and \
                 never start the same stage twice.",
            ),
            codes::STAGE_ORDER => Some(
                "Stages run strictly in catalog order. Complete every earlier \
                 stage first.",
            ),
            codes::COUNTER => Some(
                "completed_items must be monotonic and never exceed total_items.",
            ),
            _ => None,
        }
    }
}

/// Error raised when the orchestrator configuration fails validation.
#[derive(Debug, Clone, Error)]
#[error("Invalid configuration{}: {message}", .field.as_ref().map(|f| format!(" for '{f}'")).unwrap_or_default())]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// The offending field, if known.
    pub field: Option<String>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    /// Sets the offending field.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// Errors returned by stage workers.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker could not produce its output.
    #[error("{0}")]
    Failed(String),

    /// The worker exceeded the caller-imposed deadline.
    #[error("Worker timed out after {timeout_seconds}s")]
    Timeout {
        /// The deadline in seconds.
        timeout_seconds: f64,
    },

    /// The worker observed cancellation and stopped.
    #[error("Worker cancelled: {0}")]
    Cancelled(String),

    /// Any other error raised inside the worker.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WorkerError {
    /// Creates a failure with a message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Error raised by the persistence collaborator.
#[derive(Debug, Clone, Error)]
#[error("Persistence {operation} failed for run {run_id}: {message}")]
pub struct PersistenceError {
    /// The operation that failed.
    pub operation: String,
    /// The run being persisted.
    pub run_id: Uuid,
    /// What went wrong.
    pub message: String,
}

impl PersistenceError {
    /// Creates a new persistence error.
    #[must_use]
    pub fn new(operation: impl Into<String>, run_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            run_id,
            message: message.into(),
        }
    }
}

/// The error returned by a production run, with the state it ended in.
///
/// `summary` is `None` only when the request was rejected before a run was
/// created.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunError {
    /// The error that ended the run.
    #[source]
    pub error: ContentflowError,
    /// The run id, if a run was created.
    pub run_id: Option<Uuid>,
    /// Progress snapshot at the time of failure.
    pub summary: Option<Box<ProgressSummary>>,
}

impl RunError {
    /// Wraps an error raised before any run existed.
    #[must_use]
    pub fn rejected(error: ContentflowError) -> Self {
        Self {
            error,
            run_id: None,
            summary: None,
        }
    }

    /// Wraps an error raised while driving a run.
    #[must_use]
    pub fn during_run(error: ContentflowError, summary: ProgressSummary) -> Self {
        Self {
            error,
            run_id: Some(summary.run_id),
            summary: Some(Box::new(summary)),
        }
    }
}

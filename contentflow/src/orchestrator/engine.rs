//! The production pipeline orchestrator.

use super::registry::{RunEntry, RunRegistry};
use super::{OrchestratorConfig, ProductionOutcome, ProductionRequest};
use crate::automation::{AutomationMode, AutomationPolicy, ConfirmationGate, PendingConfirmation};
use crate::cancellation::CancellationToken;
use crate::core::Stage;
use crate::errors::{codes, ConfigurationError, ContentflowError, ContractViolation, RunError, WorkerError};
use crate::events::{NoOpStatusSink, StatusSink};
use crate::persistence::{NoOpRunStore, RunStatus, RunStore};
use crate::progress::{ProgressSummary, ProgressTracker};
use crate::utils::generate_run_id;
use crate::workers::{StageInput, Worker, WorkerContext, WorkerOutput, WorkerRegistry};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Builder for a [`PipelineOrchestrator`].
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    workers: WorkerRegistry,
    store: Arc<dyn RunStore>,
    sink: Arc<dyn StatusSink>,
}

impl fmt::Debug for OrchestratorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorBuilder")
            .field("config", &self.config)
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl OrchestratorBuilder {
    /// Starts a builder with no workers, a no-op store, and a no-op sink.
    #[must_use]
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            workers: WorkerRegistry::new(),
            store: Arc::new(NoOpRunStore),
            sink: Arc::new(NoOpStatusSink),
        }
    }

    /// Assigns a worker to a stage.
    ///
    /// # Errors
    ///
    /// Returns an error if `stage` is a pseudo-stage.
    pub fn worker(mut self, stage: Stage, worker: Arc<dyn Worker>) -> Result<Self, ContractViolation> {
        self.workers.register(stage, worker)?;
        Ok(self)
    }

    /// Replaces every worker assignment.
    #[must_use]
    pub fn workers(mut self, workers: WorkerRegistry) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the persistence collaborator.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = store;
        self
    }

    /// Sets the status sink handed to every run's tracker.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Validates the configuration and the worker assignments.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a mandatory
    /// stage has no worker.
    pub fn build(self) -> Result<PipelineOrchestrator, ConfigurationError> {
        self.config.validate()?;
        self.workers.validate()?;
        let policy = self.config.automation_policy()?;
        Ok(PipelineOrchestrator {
            config: self.config,
            workers: self.workers,
            policy: RwLock::new(policy),
            gate: ConfirmationGate::new(),
            runs: RunRegistry::new(),
            store: self.store,
            sink: self.sink,
        })
    }
}

/// Drives production runs through the stage catalog.
///
/// One orchestrator serves many concurrent runs. Each run is a single
/// sequential control flow; stages of one run never overlap. Pause and
/// cancel take effect at the next stage boundary, and cancel also drops
/// the in-flight worker call.
pub struct PipelineOrchestrator {
    config: OrchestratorConfig,
    workers: WorkerRegistry,
    policy: RwLock<AutomationPolicy>,
    gate: ConfirmationGate,
    runs: RunRegistry,
    store: Arc<dyn RunStore>,
    sink: Arc<dyn StatusSink>,
}

impl fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("workers", &self.workers.len())
            .field("runs", &self.runs.len())
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

/// A run started with [`PipelineOrchestrator::start`].
#[derive(Debug)]
pub struct RunHandle {
    run_id: Uuid,
    task: JoinHandle<Result<ProductionOutcome, RunError>>,
}

impl RunHandle {
    /// The id of the started run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns true once the run's task has returned.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the run to finish.
    pub async fn join(self) -> Result<ProductionOutcome, RunError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(RunError {
                error: ContentflowError::Internal(format!("run task failed: {e}")),
                run_id: Some(self.run_id),
                summary: None,
            }),
        }
    }
}

/// Result of a pause or resume request.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlOutcome {
    /// Whether the request changed the run.
    pub changed: bool,
    /// The run's summary after the request.
    pub summary: ProgressSummary,
}

type StageOutputs = (BTreeMap<Stage, serde_json::Value>, BTreeMap<Stage, f64>);

impl PipelineOrchestrator {
    /// Starts a builder.
    #[must_use]
    pub fn builder(config: OrchestratorConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// The validated configuration.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs a request to completion on the current task.
    ///
    /// # Errors
    ///
    /// Returns a [`RunError`] without a summary if the request was rejected
    /// before a run was created, and with the final summary if a stage
    /// failed, a confirmation was refused, or the run was cancelled.
    pub async fn run(&self, request: ProductionRequest) -> Result<ProductionOutcome, RunError> {
        let (entry, request) = self.admit(request)?;
        self.drive(entry, request).await
    }

    /// Registers a run and drives it on a spawned task.
    ///
    /// The run id is available immediately, so callers can pause, cancel,
    /// or subscribe while the run executes.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is rejected.
    pub fn start(self: &Arc<Self>, request: ProductionRequest) -> Result<RunHandle, RunError> {
        let (entry, request) = self.admit(request)?;
        let run_id = entry.run_id();
        let this = Arc::clone(self);
        let task = tokio::spawn(async move { this.drive(entry, request).await });
        Ok(RunHandle { run_id, task })
    }

    /// Suspends a run at its next stage boundary. `changed` is false if the
    /// run was already paused or is terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if the run is unknown.
    pub async fn pause(&self, run_id: Uuid) -> Result<ControlOutcome, ContentflowError> {
        let entry = self.runs.get(run_id)?;
        let outcome = entry.with_tracker(|t| ControlOutcome {
            changed: t.pause() && entry.control().pause(),
            summary: t.summary(),
        });
        if outcome.changed {
            info!(%run_id, "Production run paused");
            self.persist_status(run_id, RunStatus::Paused).await;
        }
        Ok(outcome)
    }

    /// Resumes a paused run. `changed` is false if the run was not paused.
    ///
    /// # Errors
    ///
    /// Returns an error if the run is unknown.
    pub async fn resume(&self, run_id: Uuid) -> Result<ControlOutcome, ContentflowError> {
        let entry = self.runs.get(run_id)?;
        let outcome = entry.with_tracker(|t| ControlOutcome {
            changed: t.resume() && entry.control().resume(),
            summary: t.summary(),
        });
        if outcome.changed {
            info!(%run_id, "Production run resumed");
            self.persist_status(run_id, RunStatus::Running).await;
        }
        Ok(outcome)
    }

    /// Cancels a run. The run fails immediately and every later transition
    /// is refused.
    ///
    /// # Errors
    ///
    /// Returns a contract violation if the run is already terminal.
    pub async fn cancel(&self, run_id: Uuid, reason: impl Into<String>) -> Result<ProgressSummary, ContentflowError> {
        let entry = self.runs.get(run_id)?;
        let reason = reason.into();
        entry.with_tracker(|t| {
            if t.is_terminal() {
                return Err(ContentflowError::from(
                    ContractViolation::new(
                        codes::RUN_TERMINAL,
                        format!("run {run_id} already ended and cannot be cancelled"),
                    )
                    .with_context_entry("current_stage", t.current_stage()),
                ));
            }
            let stage = blame_stage(t);
            t.add_error(stage, format!("cancelled: {reason}"))?;
            t.fail()?;
            entry.control().cancel(reason.clone());
            Ok(())
        })?;

        self.gate.discard_run(run_id);
        info!(%run_id, %reason, "Production run cancelled");
        self.persist_status(run_id, RunStatus::Cancelled).await;
        self.save_terminal_run(&entry).await;
        Ok(entry.snapshot())
    }

    /// Returns a snapshot of a run.
    pub fn get_progress(&self, run_id: Uuid) -> Result<ProgressSummary, ContentflowError> {
        Ok(self.runs.get(run_id)?.snapshot())
    }

    /// Returns a channel that receives a snapshot after every transition.
    pub fn subscribe(&self, run_id: Uuid) -> Result<watch::Receiver<ProgressSummary>, ContentflowError> {
        Ok(self.runs.get(run_id)?.subscribe())
    }

    /// Lets a waiting human-assisted stage run.
    pub fn confirm_stage(&self, run_id: Uuid, stage: Stage) -> Result<(), ContentflowError> {
        self.runs.get(run_id)?;
        if self.gate.confirm(run_id, stage) {
            info!(%run_id, stage = %stage, "Stage confirmed");
            Ok(())
        } else {
            Err(not_pending(run_id, stage))
        }
    }

    /// Refuses a waiting human-assisted stage. The run fails.
    pub fn reject_stage(&self, run_id: Uuid, stage: Stage, reason: impl Into<String>) -> Result<(), ContentflowError> {
        self.runs.get(run_id)?;
        if self.gate.reject(run_id, stage, reason) {
            info!(%run_id, stage = %stage, "Stage rejected");
            Ok(())
        } else {
            Err(not_pending(run_id, stage))
        }
    }

    /// Lists the confirmations runs are waiting for.
    #[must_use]
    pub fn pending_confirmations(&self) -> Vec<PendingConfirmation> {
        self.gate.pending()
    }

    /// Drops a terminal run from the registry and returns its final
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns a contract violation if the run is still active.
    pub fn forget(&self, run_id: Uuid) -> Result<ProgressSummary, ContentflowError> {
        let entry = self.runs.get(run_id)?;
        if !entry.is_terminal() {
            return Err(ContractViolation::new(
                codes::RUN_ACTIVE,
                format!("run {run_id} is still active; cancel it or wait for it to finish"),
            )
            .into());
        }
        self.runs.remove(run_id);
        Ok(entry.snapshot())
    }

    /// Ids of every registered run.
    #[must_use]
    pub fn run_ids(&self) -> Vec<Uuid> {
        self.runs.ids()
    }

    /// Number of runs that have not ended.
    #[must_use]
    pub fn active_runs(&self) -> usize {
        self.runs.active_count()
    }

    /// The automation policy applied to stages that have not started yet.
    #[must_use]
    pub fn automation_policy(&self) -> AutomationPolicy {
        self.policy.read().clone()
    }

    /// Replaces the automation policy.
    pub fn set_automation_policy(&self, policy: AutomationPolicy) {
        *self.policy.write() = policy;
    }

    /// Re-derives the automation policy from a mode.
    pub fn set_automation_mode(&self, mode: AutomationMode, auto_stages: &[Stage]) -> Result<(), ContractViolation> {
        self.policy.write().set_mode(mode, auto_stages)
    }

    fn admit(&self, request: ProductionRequest) -> Result<(Arc<RunEntry>, Arc<ProductionRequest>), RunError> {
        request.validate().map_err(RunError::rejected)?;
        if request.wants_style() && !self.workers.contains(Stage::StyleAdaptation) {
            return Err(RunError::rejected(ContentflowError::InvalidRequest(
                "a style was requested but no style adaptation worker is registered".to_string(),
            )));
        }

        let tracker = ProgressTracker::new(
            generate_run_id(),
            self.config.stage_weights.clone(),
            Arc::clone(&self.sink),
        );
        let entry = self.runs.insert(RunEntry::new(tracker));
        info!(run_id = %entry.run_id(), "Production run admitted");
        Ok((entry, Arc::new(request)))
    }

    async fn drive(&self, entry: Arc<RunEntry>, request: Arc<ProductionRequest>) -> Result<ProductionOutcome, RunError> {
        let run_id = entry.run_id();
        let span = info_span!("production_run", %run_id);
        async move {
            self.persist_status(run_id, RunStatus::Running).await;

            let (outputs, scores) = match self.drive_stages(&entry, &request).await {
                Ok(produced) => produced,
                Err(e) => return Err(self.abort(&entry, e).await),
            };
            if let Err(e) = self.apply_when_running(&entry, |t| t.complete()).await {
                return Err(self.abort(&entry, e).await);
            }

            let summary = entry.snapshot();
            info!(
                duration_seconds = summary.duration_seconds,
                total_errors = summary.total_errors,
                "Production run completed"
            );
            self.persist_status(run_id, RunStatus::Completed).await;
            self.save_terminal_run(&entry).await;
            Ok(ProductionOutcome {
                run_id,
                summary,
                outputs,
                scores,
            })
        }
        .instrument(span)
        .await
    }

    async fn drive_stages(&self, entry: &RunEntry, request: &Arc<ProductionRequest>) -> Result<StageOutputs, ContentflowError> {
        let run_id = entry.run_id();
        let mut outputs = BTreeMap::new();
        let mut scores = BTreeMap::new();

        for stage in Stage::REAL {
            let worker = if stage.is_optional() && !request.wants_style() {
                None
            } else {
                Some(self.workers.get(stage).ok_or_else(|| {
                    ContentflowError::Internal(format!("no worker registered for '{stage}'"))
                })?)
            };
            let input = StageInput::new(run_id, stage, Arc::clone(request), outputs.clone());
            let units = worker.as_ref().map_or(0, |w| w.expected_units(&input));

            self.apply_when_running(entry, |t| t.start_stage(stage, units)).await?;

            let Some(worker) = worker else {
                debug!(stage = %stage, "No style requested, skipping worker");
                self.apply_when_running(entry, |t| t.complete_stage(stage)).await?;
                continue;
            };
            info!(stage = %stage, worker = worker.name(), units, "Stage started");

            let auto = self.policy.read().is_auto(stage)?;
            if !auto {
                info!(stage = %stage, "Waiting for confirmation");
                self.gate
                    .request(run_id, stage, self.config.confirmation_timeout(), &entry.control().token())
                    .await?;
            }
            entry.control().wait_until_runnable().await?;

            let ctx = WorkerContext::new(run_id, stage, entry.control());
            let output = self
                .invoke(worker.as_ref(), input, ctx, &entry.control().token())
                .await
                .map_err(|source| ContentflowError::Worker { stage, source })?;

            self.apply_when_running(entry, |t| {
                t.update_progress(stage, units, output.score, output.error_count)?;
                t.complete_stage(stage)
            })
            .await?;
            info!(
                stage = %stage,
                score = output.score,
                error_count = output.error_count,
                "Stage completed"
            );

            scores.insert(stage, output.score);
            outputs.insert(stage, output.content);
        }

        Ok((outputs, scores))
    }

    async fn invoke(
        &self,
        worker: &dyn Worker,
        input: StageInput,
        ctx: WorkerContext,
        token: &CancellationToken,
    ) -> Result<WorkerOutput, WorkerError> {
        let call = worker.execute(input, ctx);
        let bounded = async {
            match self.config.worker_timeout() {
                Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| WorkerError::Timeout {
                    timeout_seconds: limit.as_secs_f64(),
                })?,
                None => call.await,
            }
        };

        tokio::select! {
            biased;
            () = token.cancelled() => Err(WorkerError::Cancelled(token.reason().unwrap_or_default())),
            result = bounded => result,
        }
    }

    /// Applies a tracker transition once the run is not paused.
    ///
    /// The paused check and the transition happen under one lock, so a
    /// pause that lands between them is never overwritten.
    async fn apply_when_running<R>(
        &self,
        entry: &RunEntry,
        mut transition: impl FnMut(&mut ProgressTracker) -> Result<R, ContentflowError>,
    ) -> Result<R, ContentflowError> {
        loop {
            entry.control().wait_until_runnable().await?;
            let applied = entry.with_tracker(|t| (!t.is_paused()).then(|| transition(t)));
            if let Some(result) = applied {
                return result;
            }
        }
    }

    async fn abort(&self, entry: &RunEntry, error: ContentflowError) -> RunError {
        let run_id = entry.run_id();
        let token = entry.control().token();
        // A terminal run here was ended by `cancel`, which owns its persistence.
        let recorded = entry.with_tracker(|t| {
            if t.is_terminal() || token.is_cancelled() {
                return Ok(false);
            }
            let stage = blame_stage(t);
            t.add_error(stage, error.to_string())?;
            t.fail().map(|()| true)
        });
        match recorded {
            Ok(false) => {
                let reason = token.reason().unwrap_or_else(|| error.to_string());
                debug!(%run_id, %error, "Run loop stopped after cancellation");
                return RunError::during_run(ContentflowError::Cancelled(reason), entry.snapshot());
            }
            Ok(true) => {}
            Err(e) => warn!(%run_id, error = %e, "Could not record run failure"),
        }
        self.gate.discard_run(run_id);

        error!(%run_id, %error, "Production run failed");
        self.persist_status(run_id, RunStatus::Failed).await;
        self.save_terminal_run(entry).await;
        RunError::during_run(error, entry.snapshot())
    }

    async fn persist_status(&self, run_id: Uuid, status: RunStatus) {
        if let Err(e) = self.store.update_status(run_id, status).await {
            warn!(%run_id, %status, error = %e, "Failed to persist run status");
        }
    }

    async fn save_terminal_run(&self, entry: &RunEntry) {
        let run = entry.inspect(|t| t.run().clone());
        if let Err(e) = self.store.save_terminal_run(&run).await {
            warn!(run_id = %run.id, error = %e, "Failed to persist terminal run");
        }
    }
}

/// The stage an error belongs to: the running or paused stage, else the
/// position the run was at.
fn blame_stage(tracker: &ProgressTracker) -> Stage {
    if let Some(stage) = tracker.active_stage() {
        return stage;
    }
    match tracker.run().pause_snapshot {
        Some(snapshot) if tracker.is_paused() => snapshot.previous_stage,
        _ => tracker.current_stage(),
    }
}

fn not_pending(run_id: Uuid, stage: Stage) -> ContentflowError {
    ContractViolation::new(
        codes::NOT_PENDING,
        format!("run {run_id} is not waiting for confirmation of '{stage}'"),
    )
    .with_stage(stage)
    .into()
}

//! Per-run control signals.

use super::CancellationToken;
use crate::errors::ContentflowError;
use tokio::sync::watch;

/// Cancel and pause signals for one production run.
///
/// The orchestrator's control loop checks these at every stage boundary;
/// workers see them through their `WorkerContext`.
#[derive(Debug)]
pub struct RunControl {
    token: CancellationToken,
    paused: watch::Sender<bool>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    /// Creates signals for a running (not paused, not cancelled) run.
    #[must_use]
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            token: CancellationToken::new(),
            paused,
        }
    }

    /// Returns a clone of the run's cancellation token.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Returns a receiver that observes the pause flag.
    #[must_use]
    pub fn pause_receiver(&self) -> watch::Receiver<bool> {
        self.paused.subscribe()
    }

    /// Cancels the run. Returns true if this call cancelled it.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        self.token.cancel(reason)
    }

    /// Returns true if the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Raises the pause flag. Returns true if it was not raised before.
    pub fn pause(&self) -> bool {
        self.paused.send_if_modified(|paused| !std::mem::replace(paused, true))
    }

    /// Lowers the pause flag. Returns true if it was raised before.
    pub fn resume(&self) -> bool {
        self.paused.send_if_modified(|paused| std::mem::replace(paused, false))
    }

    /// Returns true while the pause flag is raised.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Waits until the run is neither paused nor cancelled.
    ///
    /// Returns [`ContentflowError::Cancelled`] as soon as the run is
    /// cancelled, including while it is paused.
    pub async fn wait_until_runnable(&self) -> Result<(), ContentflowError> {
        let mut paused = self.paused.subscribe();
        loop {
            if self.token.is_cancelled() {
                return Err(ContentflowError::Cancelled(
                    self.token.reason().unwrap_or_default(),
                ));
            }
            if !*paused.borrow_and_update() {
                return Ok(());
            }
            tokio::select! {
                () = self.token.cancelled() => {}
                changed = paused.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

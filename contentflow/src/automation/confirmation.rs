//! Confirmation gate for human-assisted stages.

use crate::cancellation::CancellationToken;
use crate::core::Stage;
use crate::errors::ContentflowError;
use crate::utils::{now_utc, Timestamp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

/// The answer to a confirmation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationDecision {
    /// Go ahead with the stage.
    Confirmed,
    /// Do not run the stage; the run fails with this reason.
    Rejected(String),
}

/// A confirmation that is waiting for an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    /// The run waiting.
    pub run_id: Uuid,
    /// The stage waiting.
    pub stage: Stage,
    /// When the request was made.
    pub requested_at: Timestamp,
}

struct Waiter {
    requested_at: Timestamp,
    responder: oneshot::Sender<ConfirmationDecision>,
}

/// Holds the confirmations human-assisted stages are waiting for.
///
/// At most one request is outstanding per `(run, stage)`.
#[derive(Default)]
pub struct ConfirmationGate {
    waiters: Mutex<HashMap<(Uuid, Stage), Waiter>>,
}

impl ConfirmationGate {
    /// Creates an empty gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for a confirmation of `stage` in run `run_id`.
    ///
    /// Resolves with an error when the stage is rejected, when `timeout`
    /// elapses, when the run is cancelled, or when the request is discarded.
    pub async fn request(
        &self,
        run_id: Uuid,
        stage: Stage,
        timeout: Option<Duration>,
        token: &CancellationToken,
    ) -> Result<(), ContentflowError> {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().insert(
            (run_id, stage),
            Waiter {
                requested_at: now_utc(),
                responder: tx,
            },
        );
        debug!(%run_id, stage = %stage, "Waiting for confirmation");

        let answer = async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, rx).await.map_err(|_| limit),
                None => Ok(rx.await),
            }
        };

        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => {
                Err(ContentflowError::Cancelled(token.reason().unwrap_or_default()))
            }
            answer = answer => match answer {
                Ok(Ok(ConfirmationDecision::Confirmed)) => Ok(()),
                Ok(Ok(ConfirmationDecision::Rejected(reason))) => {
                    Err(ContentflowError::ConfirmationRejected { stage, reason })
                }
                Ok(Err(_)) => Err(ContentflowError::Cancelled(
                    "confirmation request was withdrawn".to_string(),
                )),
                Err(limit) => Err(ContentflowError::ConfirmationTimeout {
                    stage,
                    timeout_seconds: limit.as_secs_f64(),
                }),
            },
        };

        self.waiters.lock().remove(&(run_id, stage));
        outcome
    }

    /// Confirms a pending request. Returns false if none was waiting.
    pub fn confirm(&self, run_id: Uuid, stage: Stage) -> bool {
        self.answer(run_id, stage, ConfirmationDecision::Confirmed)
    }

    /// Rejects a pending request. Returns false if none was waiting.
    pub fn reject(&self, run_id: Uuid, stage: Stage, reason: impl Into<String>) -> bool {
        self.answer(run_id, stage, ConfirmationDecision::Rejected(reason.into()))
    }

    /// Withdraws every pending request of a run.
    pub fn discard_run(&self, run_id: Uuid) -> usize {
        let mut waiters = self.waiters.lock();
        let before = waiters.len();
        waiters.retain(|(id, _), _| *id != run_id);
        before - waiters.len()
    }

    /// Returns true if `(run_id, stage)` is waiting.
    #[must_use]
    pub fn is_pending(&self, run_id: Uuid, stage: Stage) -> bool {
        self.waiters.lock().contains_key(&(run_id, stage))
    }

    /// Lists waiting requests, oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<PendingConfirmation> {
        let mut pending: Vec<_> = self
            .waiters
            .lock()
            .iter()
            .map(|((run_id, stage), waiter)| PendingConfirmation {
                run_id: *run_id,
                stage: *stage,
                requested_at: waiter.requested_at,
            })
            .collect();
        pending.sort_by_key(|p| p.requested_at);
        pending
    }

    fn answer(&self, run_id: Uuid, stage: Stage, decision: ConfirmationDecision) -> bool {
        match self.waiters.lock().remove(&(run_id, stage)) {
            Some(waiter) => waiter.responder.send(decision).is_ok(),
            None => false,
        }
    }
}

impl std::fmt::Debug for ConfirmationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmationGate")
            .field("pending_count", &self.waiters.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn wait_for_pending(gate: &ConfirmationGate, run_id: Uuid, stage: Stage) {
        for _ in 0..100 {
            if gate.is_pending(run_id, stage) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("confirmation for {stage} never became pending");
    }

    #[tokio::test]
    async fn test_confirm() {
        let gate = Arc::new(ConfirmationGate::new());
        let run_id = Uuid::new_v4();
        let waiter = Arc::clone(&gate);
        let handle = tokio::spawn(async move {
            waiter
                .request(run_id, Stage::TopicResearch, None, &CancellationToken::new())
                .await
        });

        wait_for_pending(&gate, run_id, Stage::TopicResearch).await;
        assert_eq!(gate.pending().len(), 1);
        assert!(gate.confirm(run_id, Stage::TopicResearch));

        tokio_test::assert_ok!(handle.await.unwrap());
        assert!(gate.pending().is_empty());
    }

    #[tokio::test]
    async fn test_reject() {
        let gate = Arc::new(ConfirmationGate::new());
        let run_id = Uuid::new_v4();
        let waiter = Arc::clone(&gate);
        let handle = tokio::spawn(async move {
            waiter
                .request(run_id, Stage::ArticleReview, None, &CancellationToken::new())
                .await
        });

        wait_for_pending(&gate, run_id, Stage::ArticleReview).await;
        assert!(gate.reject(run_id, Stage::ArticleReview, "off-brand"));

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            ContentflowError::ConfirmationRejected { stage: Stage::ArticleReview, ref reason } if reason == "off-brand"
        ));
    }

    #[tokio::test]
    async fn test_timeout() {
        let gate = ConfirmationGate::new();
        let err = gate
            .request(
                Uuid::new_v4(),
                Stage::TopicDiscovery,
                Some(Duration::from_millis(20)),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ContentflowError::ConfirmationTimeout { .. }));
        assert!(gate.pending().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_releases_waiter() {
        let gate = Arc::new(ConfirmationGate::new());
        let token = CancellationToken::new();
        let run_id = Uuid::new_v4();

        let waiter = Arc::clone(&gate);
        let waiter_token = token.clone();
        let handle = tokio::spawn(async move {
            waiter
                .request(run_id, Stage::ArticleWriting, None, &waiter_token)
                .await
        });

        wait_for_pending(&gate, run_id, Stage::ArticleWriting).await;
        token.cancel("stop");

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, ContentflowError::Cancelled(_)));
        assert!(!gate.is_pending(run_id, Stage::ArticleWriting));
    }

    #[tokio::test]
    async fn test_discard_run_withdraws_request() {
        let gate = Arc::new(ConfirmationGate::new());
        let run_id = Uuid::new_v4();
        let waiter = Arc::clone(&gate);
        let handle = tokio::spawn(async move {
            waiter
                .request(run_id, Stage::TopicResearch, None, &CancellationToken::new())
                .await
        });

        wait_for_pending(&gate, run_id, Stage::TopicResearch).await;
        assert_eq!(gate.discard_run(run_id), 1);

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, ContentflowError::Cancelled(_)));
    }

    #[test]
    fn test_answer_without_request() {
        let gate = ConfirmationGate::new();
        assert!(!gate.confirm(Uuid::new_v4(), Stage::TopicDiscovery));
        assert!(!gate.reject(Uuid::new_v4(), Stage::TopicDiscovery, "no"));
    }
}

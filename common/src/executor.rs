// Transition executor
//
// Applies the publish or unpublish state change for one claimed schedule
// entry, removes the entry, and reports the outcome to the workflow
// correlator. Transient content-service failures are retried with backoff
// inside the execution; when the attempt budget runs out the claim is
// released and the entry stays pending for the next scan.

use crate::content::ContentStore;
use crate::correlator::WorkflowCorrelator;
use crate::errors::{ContentError, ExecutionError};
use crate::models::{CompletionOutcome, ContentTarget, PublicationState, ScheduleEntry};
use crate::retry::RetryStrategy;
use crate::store::{EntryClaim, ScheduleStore};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct TransitionExecutor {
    store: Arc<dyn ScheduleStore>,
    content: Arc<dyn ContentStore>,
    correlator: Arc<WorkflowCorrelator>,
    retry_strategy: Arc<dyn RetryStrategy>,
}

impl TransitionExecutor {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        content: Arc<dyn ContentStore>,
        correlator: Arc<WorkflowCorrelator>,
        retry_strategy: Arc<dyn RetryStrategy>,
    ) -> Self {
        Self {
            store,
            content,
            correlator,
            retry_strategy,
        }
    }

    /// Execute one claimed entry.
    ///
    /// The caller must hold the claim; the entry is removed on every
    /// terminal outcome (applied, already in target state, target missing)
    /// and kept pending on transient failure.
    #[instrument(skip(self, entry, claim), fields(
        entry_id = %entry.id,
        kind = %entry.kind,
        target = %entry.target()
    ))]
    pub async fn execute(
        &self,
        entry: &ScheduleEntry,
        claim: &EntryClaim,
    ) -> Result<CompletionOutcome, ExecutionError> {
        let target = entry.target();
        let desired = entry.kind.desired_state();

        let current = match self.read_state_with_retry(&target).await {
            Ok(state) => state,
            Err(e) => {
                self.abandon(claim).await;
                return Err(e);
            }
        };

        let Some(current) = current else {
            // The scheduled target is gone. Terminal: remove the entry,
            // no state change, no retry.
            warn!("Scheduled target no longer exists, removing entry");
            self.finish(entry, claim, CompletionOutcome::TargetMissing)
                .await?;
            return Err(ExecutionError::TargetNotFound(target.to_string()));
        };

        if current == desired {
            // Desired end-state already reached; success by idempotence.
            debug!(state = %current, "Target already in desired state");
            return self
                .finish(entry, claim, CompletionOutcome::AlreadyApplied)
                .await;
        }

        if let Err(e) = self.set_state_with_retry(&target, desired).await {
            self.abandon(claim).await;
            return Err(e);
        }

        info!(state = %desired, "Publication state transition applied");
        self.finish(entry, claim, CompletionOutcome::Applied).await
    }

    /// Remove the entry under its claim and notify the owning workflow.
    ///
    /// A lost lease means another worker may already be re-executing the
    /// entry; in that case nothing is removed and the notification is left
    /// to whoever completes it.
    async fn finish(
        &self,
        entry: &ScheduleEntry,
        claim: &EntryClaim,
        outcome: CompletionOutcome,
    ) -> Result<CompletionOutcome, ExecutionError> {
        let removed = self.store.delete_claimed(claim).await?;
        if removed {
            self.correlator
                .notify_completed(entry.workflow_instance_id, entry.id, outcome)
                .await;
        } else {
            warn!(
                entry_id = %entry.id,
                "Claim lease lost before completion, leaving entry for rescan"
            );
        }
        Ok(outcome)
    }

    /// Return the claim so the next scan can retry the entry.
    async fn abandon(&self, claim: &EntryClaim) {
        if let Err(e) = self.store.release(claim).await {
            warn!(
                entry_id = %claim.entry_id,
                error = %e,
                "Failed to release claim, lease will expire on its own"
            );
        }
    }

    async fn read_state_with_retry(
        &self,
        target: &ContentTarget,
    ) -> Result<Option<PublicationState>, ExecutionError> {
        let mut attempt = 0;
        loop {
            match self.content.publication_state(target).await {
                Ok(state) => return Ok(state),
                Err(e) => attempt = self.backoff_or_fail(target, attempt, e).await?,
            }
        }
    }

    async fn set_state_with_retry(
        &self,
        target: &ContentTarget,
        state: PublicationState,
    ) -> Result<(), ExecutionError> {
        let mut attempt = 0;
        loop {
            match self.content.set_publication_state(target, state).await {
                Ok(()) => return Ok(()),
                Err(e) => attempt = self.backoff_or_fail(target, attempt, e).await?,
            }
        }
    }

    /// Sleep out the backoff delay and hand back the next attempt number,
    /// or give up on non-transient errors and an exhausted budget.
    async fn backoff_or_fail(
        &self,
        target: &ContentTarget,
        attempt: u32,
        error: ContentError,
    ) -> Result<u32, ExecutionError> {
        if !error.is_transient() {
            return Err(ExecutionError::ContentServiceFailed {
                attempts: attempt + 1,
                source: error,
            });
        }

        match self.retry_strategy.next_delay(attempt) {
            Some(delay) => {
                debug!(
                    target = %target,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient content service failure, retrying"
                );
                tokio::time::sleep(delay).await;
                Ok(attempt + 1)
            }
            None => Err(ExecutionError::ContentServiceFailed {
                attempts: attempt + 1,
                source: error,
            }),
        }
    }
}

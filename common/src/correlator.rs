// Workflow correlator
//
// Links schedule entries back to the workflow instance that created them:
// completion signaling after execution, and bulk cancellation when the
// owning workflow is aborted or rolled back.

use crate::errors::{NotifyError, StoreError};
use crate::models::CompletionOutcome;
use crate::store::ScheduleStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Completion/failure callback into the workflow engine.
#[async_trait]
pub trait WorkflowNotifier: Send + Sync {
    async fn notify_completed(
        &self,
        workflow_instance_id: Uuid,
        entry_id: Uuid,
        outcome: CompletionOutcome,
    ) -> Result<(), NotifyError>;
}

/// Log-based notifier (default implementation)
///
/// Deployments wire a real callback into the workflow engine here; the
/// default records the completion at INFO level.
pub struct LogWorkflowNotifier;

#[async_trait]
impl WorkflowNotifier for LogWorkflowNotifier {
    #[instrument(skip(self))]
    async fn notify_completed(
        &self,
        workflow_instance_id: Uuid,
        entry_id: Uuid,
        outcome: CompletionOutcome,
    ) -> Result<(), NotifyError> {
        info!(
            workflow_instance_id = %workflow_instance_id,
            entry_id = %entry_id,
            outcome = %outcome,
            "Scheduled operation completed"
        );
        Ok(())
    }
}

/// Correlates entries with their originating workflow instance.
pub struct WorkflowCorrelator {
    store: Arc<dyn ScheduleStore>,
    notifier: Arc<dyn WorkflowNotifier>,
}

impl WorkflowCorrelator {
    pub fn new(store: Arc<dyn ScheduleStore>, notifier: Arc<dyn WorkflowNotifier>) -> Self {
        Self { store, notifier }
    }

    /// Signal completion back to the owning workflow.
    ///
    /// Best-effort: the transition already happened and is the source of
    /// truth, so a failed notification is logged and never rolls anything
    /// back.
    #[instrument(skip(self))]
    pub async fn notify_completed(
        &self,
        workflow_instance_id: Uuid,
        entry_id: Uuid,
        outcome: CompletionOutcome,
    ) {
        if let Err(e) = self
            .notifier
            .notify_completed(workflow_instance_id, entry_id, outcome)
            .await
        {
            warn!(
                workflow_instance_id = %workflow_instance_id,
                entry_id = %entry_id,
                outcome = %outcome,
                error = %e,
                "Failed to deliver completion notification"
            );
        }
    }

    /// Delete all pending entries created by the given workflow instance.
    ///
    /// Used when the workflow is aborted or rolled back. Entries already
    /// claimed by a worker are not touched: the claim wins, and the
    /// in-flight execution proceeds.
    #[instrument(skip(self))]
    pub async fn cancel_for_workflow(
        &self,
        workflow_instance_id: Uuid,
    ) -> Result<u64, StoreError> {
        let cancelled = self.store.delete_for_workflow(workflow_instance_id).await?;
        info!(
            workflow_instance_id = %workflow_instance_id,
            cancelled,
            "Workflow schedule entries cancelled"
        );
        Ok(cancelled)
    }
}

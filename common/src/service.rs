// Scheduling service
//
// The surface the workflow engine calls: schedule a deferred operation,
// cancel everything a workflow scheduled, and query what is still pending
// for a target.

use crate::correlator::WorkflowCorrelator;
use crate::errors::StoreError;
use crate::models::{ContentTarget, ScheduleEntry, ScheduleKind};
use crate::store::ScheduleStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub struct ScheduleService {
    store: Arc<dyn ScheduleStore>,
    correlator: Arc<WorkflowCorrelator>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn ScheduleStore>, correlator: Arc<WorkflowCorrelator>) -> Self {
        Self { store, correlator }
    }

    /// Schedule a deferred operation on a content-item-locale pair.
    ///
    /// Returns the id of the created entry. Fails with
    /// [`StoreError::DuplicateTarget`] when a pending entry of the same
    /// kind exists for the target and the store rejects conflicts; the
    /// caller decides whether to cancel and recreate.
    #[instrument(skip(self, data_id, locale_culture_name))]
    pub async fn schedule_operation(
        &self,
        kind: ScheduleKind,
        data_type_id: Uuid,
        data_id: impl Into<String> + Send,
        locale_culture_name: impl Into<String> + Send,
        workflow_instance_id: Uuid,
        effective_at: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        let entry = ScheduleEntry::new(
            kind,
            data_type_id,
            data_id,
            locale_culture_name,
            workflow_instance_id,
            effective_at,
        );
        let id = self.store.create(&entry).await?;

        info!(
            entry_id = %id,
            kind = %kind,
            target = %entry.target(),
            workflow_instance_id = %workflow_instance_id,
            effective_at = %effective_at,
            "Deferred operation scheduled"
        );
        Ok(id)
    }

    /// Schedule a deferred publish.
    pub async fn schedule_publish(
        &self,
        data_type_id: Uuid,
        data_id: impl Into<String> + Send,
        locale_culture_name: impl Into<String> + Send,
        workflow_instance_id: Uuid,
        effective_at: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        self.schedule_operation(
            ScheduleKind::Publish,
            data_type_id,
            data_id,
            locale_culture_name,
            workflow_instance_id,
            effective_at,
        )
        .await
    }

    /// Schedule a deferred unpublish.
    pub async fn schedule_unpublish(
        &self,
        data_type_id: Uuid,
        data_id: impl Into<String> + Send,
        locale_culture_name: impl Into<String> + Send,
        workflow_instance_id: Uuid,
        effective_at: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        self.schedule_operation(
            ScheduleKind::Unpublish,
            data_type_id,
            data_id,
            locale_culture_name,
            workflow_instance_id,
            effective_at,
        )
        .await
    }

    /// Cancel every pending entry the given workflow instance created.
    pub async fn cancel_for_workflow(
        &self,
        workflow_instance_id: Uuid,
    ) -> Result<u64, StoreError> {
        self.correlator.cancel_for_workflow(workflow_instance_id).await
    }

    /// Fetch one entry by id. A workflow uses existence to infer
    /// pending/cancelled/executed status.
    pub async fn get(&self, id: Uuid) -> Result<Option<ScheduleEntry>, StoreError> {
        self.store.get(id).await
    }

    /// Pending entries for a content-item-locale pair.
    pub async fn pending_for_target(
        &self,
        target: &ContentTarget,
    ) -> Result<Vec<ScheduleEntry>, StoreError> {
        self.store.find_by_target(target).await
    }
}

// Schedule entry store
//
// The store is the single shared mutable resource of the scheduler. All
// mutations (create, claim, delete) are atomic with respect to concurrent
// claim attempts; claims are per-entry leases that also exclude other
// entries for the same target, so two operations on one content-item-locale
// pair never execute concurrently.

pub mod memory;
pub mod postgres;

pub use memory::MemoryScheduleStore;
pub use postgres::PostgresScheduleStore;

use crate::errors::StoreError;
use crate::models::{ContentTarget, ScheduleEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// A live lease on one schedule entry.
///
/// Holding a claim is the precondition for executing the entry. The token
/// guards release and delete against a lease that expired and was taken
/// over by another worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryClaim {
    pub entry_id: Uuid,
    pub target: ContentTarget,
    pub token: Uuid,
}

/// Persistence contract for pending schedule entries.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Persist a new entry after schema validation.
    ///
    /// Fails with [`StoreError::DuplicateTarget`] when a pending entry for
    /// the same target and kind exists, unless the store is configured to
    /// replace on conflict.
    async fn create(&self, entry: &ScheduleEntry) -> Result<Uuid, StoreError>;

    /// Fetch an entry by id.
    async fn get(&self, id: Uuid) -> Result<Option<ScheduleEntry>, StoreError>;

    /// Entries with `effective_at <= now` that are not currently claimed,
    /// ordered by `(effective_at, id)` ascending, at most `limit` of them.
    async fn find_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ScheduleEntry>, StoreError>;

    /// Pending entries for one content-item-locale pair.
    async fn find_by_target(
        &self,
        target: &ContentTarget,
    ) -> Result<Vec<ScheduleEntry>, StoreError>;

    /// Remove an entry. Idempotent: an absent id returns `false`.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Remove all unclaimed entries created by the given workflow
    /// instance, returning how many were removed. Entries under a live
    /// claim are skipped: once a worker has claimed an entry, the claim
    /// wins over cancellation.
    async fn delete_for_workflow(&self, workflow_instance_id: Uuid) -> Result<u64, StoreError>;

    /// Atomically lease an entry for execution.
    ///
    /// Returns `None` when the entry is gone, already under a live claim,
    /// or another entry for the same target is under a live claim. An
    /// expired lease is reclaimable.
    async fn claim(&self, id: Uuid, ttl: Duration) -> Result<Option<EntryClaim>, StoreError>;

    /// Return a claimed entry to the pending pool (transient execution
    /// failure; the next scan picks it up again).
    async fn release(&self, claim: &EntryClaim) -> Result<(), StoreError>;

    /// Compare-and-delete guarded by the claim token. Returns `false` if
    /// the entry is gone or the lease was lost.
    async fn delete_claimed(&self, claim: &EntryClaim) -> Result<bool, StoreError>;
}

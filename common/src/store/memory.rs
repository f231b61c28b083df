// In-memory schedule entry store
//
// Backs the test suite and embedded single-process deployments. Mutations
// go through one mutex; claim bookkeeping lives next to the entries so a
// claim check and the matching mutation are a single critical section.

use super::{EntryClaim, ScheduleStore};
use crate::config::ConflictPolicy;
use crate::errors::StoreError;
use crate::models::{ContentTarget, ScheduleEntry};
use crate::schema;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

struct ClaimState {
    token: Uuid,
    target: ContentTarget,
    expires_at: DateTime<Utc>,
}

impl ClaimState {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<Uuid, ScheduleEntry>,
    claims: HashMap<Uuid, ClaimState>,
}

impl Inner {
    fn has_live_claim(&self, entry_id: Uuid, now: DateTime<Utc>) -> bool {
        self.claims
            .get(&entry_id)
            .map(|c| c.is_live(now))
            .unwrap_or(false)
    }

    fn target_in_flight(&self, target: &ContentTarget, except: Uuid, now: DateTime<Utc>) -> bool {
        self.claims
            .iter()
            .any(|(id, c)| *id != except && c.target == *target && c.is_live(now))
    }
}

/// Mutex-guarded map-backed implementation of [`ScheduleStore`].
pub struct MemoryScheduleStore {
    on_conflict: ConflictPolicy,
    inner: Mutex<Inner>,
}

impl MemoryScheduleStore {
    pub fn new(on_conflict: ConflictPolicy) -> Self {
        Self {
            on_conflict,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Number of pending entries currently held.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("store mutex poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("store mutex poisoned")
    }
}

impl Default for MemoryScheduleStore {
    fn default() -> Self {
        Self::new(ConflictPolicy::Reject)
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn create(&self, entry: &ScheduleEntry) -> Result<Uuid, StoreError> {
        schema::validate_entry(entry)?;

        let now = Utc::now();
        let target = entry.target();
        let mut inner = self.lock();

        let conflicting: Vec<Uuid> = inner
            .entries
            .values()
            .filter(|e| e.id != entry.id && e.kind == entry.kind && e.target() == target)
            .map(|e| e.id)
            .collect();

        if !conflicting.is_empty() {
            let claimed = conflicting
                .iter()
                .any(|id| inner.has_live_claim(*id, now));

            // A conflicting entry that is mid-execution cannot be replaced.
            if self.on_conflict == ConflictPolicy::Reject || claimed {
                return Err(StoreError::DuplicateTarget {
                    target: target.to_string(),
                    kind: entry.kind.to_string(),
                });
            }

            for id in conflicting {
                inner.entries.remove(&id);
                inner.claims.remove(&id);
                debug!(entry_id = %id, "Replaced pending entry on conflict");
            }
        }

        inner.entries.insert(entry.id, entry.clone());
        Ok(entry.id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ScheduleEntry>, StoreError> {
        Ok(self.lock().entries.get(&id).cloned())
    }

    async fn find_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ScheduleEntry>, StoreError> {
        let inner = self.lock();
        let mut due: Vec<ScheduleEntry> = inner
            .entries
            .values()
            .filter(|e| e.is_due(now) && !inner.has_live_claim(e.id, now))
            .cloned()
            .collect();

        due.sort_by_key(|e| e.scan_key());
        due.truncate(limit);
        Ok(due)
    }

    async fn find_by_target(
        &self,
        target: &ContentTarget,
    ) -> Result<Vec<ScheduleEntry>, StoreError> {
        let inner = self.lock();
        let mut entries: Vec<ScheduleEntry> = inner
            .entries
            .values()
            .filter(|e| e.target() == *target)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.scan_key());
        Ok(entries)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        inner.claims.remove(&id);
        Ok(inner.entries.remove(&id).is_some())
    }

    async fn delete_for_workflow(&self, workflow_instance_id: Uuid) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut inner = self.lock();

        let cancellable: Vec<Uuid> = inner
            .entries
            .values()
            .filter(|e| {
                e.workflow_instance_id == workflow_instance_id
                    && !inner.has_live_claim(e.id, now)
            })
            .map(|e| e.id)
            .collect();

        for id in &cancellable {
            inner.entries.remove(id);
            inner.claims.remove(id);
        }

        debug!(
            workflow_instance_id = %workflow_instance_id,
            cancelled = cancellable.len(),
            "Cancelled pending entries for workflow"
        );
        Ok(cancellable.len() as u64)
    }

    async fn claim(&self, id: Uuid, ttl: Duration) -> Result<Option<EntryClaim>, StoreError> {
        let now = Utc::now();
        let mut inner = self.lock();

        let target = match inner.entries.get(&id) {
            Some(entry) => entry.target(),
            None => return Ok(None),
        };

        if inner.has_live_claim(id, now) || inner.target_in_flight(&target, id, now) {
            return Ok(None);
        }

        let token = Uuid::new_v4();
        let expires_at = now
            + chrono::Duration::from_std(ttl)
                .map_err(|e| StoreError::QueryFailed(format!("claim ttl out of range: {}", e)))?;

        inner.claims.insert(
            id,
            ClaimState {
                token,
                target: target.clone(),
                expires_at,
            },
        );

        Ok(Some(EntryClaim {
            entry_id: id,
            target,
            token,
        }))
    }

    async fn release(&self, claim: &EntryClaim) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(state) = inner.claims.get(&claim.entry_id) {
            if state.token == claim.token {
                inner.claims.remove(&claim.entry_id);
            }
        }
        Ok(())
    }

    async fn delete_claimed(&self, claim: &EntryClaim) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        match inner.claims.get(&claim.entry_id) {
            Some(state) if state.token == claim.token => {
                inner.claims.remove(&claim.entry_id);
                Ok(inner.entries.remove(&claim.entry_id).is_some())
            }
            // Lease lost or never held; leave the entry alone.
            _ => Ok(false),
        }
    }
}

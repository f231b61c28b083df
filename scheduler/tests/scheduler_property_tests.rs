// Property-based tests for the scheduler engine

use chrono::{Duration, Utc};
use common::config::SchedulerConfig;
use common::content::{ContentStore, InMemoryContentStore};
use common::correlator::{LogWorkflowNotifier, WorkflowCorrelator};
use common::executor::TransitionExecutor;
use common::models::{PublicationState, ScheduleEntry, ScheduleKind};
use common::retry::FixedDelay;
use common::scheduler::{Scheduler, SchedulerEngine};
use common::store::{MemoryScheduleStore, ScheduleStore};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use uuid::Uuid;

fn engine_config() -> SchedulerConfig {
    SchedulerConfig {
        poll_interval_seconds: 1,
        claim_ttl_seconds: 30,
        max_entries_per_poll: 100,
        worker_concurrency: 4,
    }
}

struct Rig {
    store: Arc<MemoryScheduleStore>,
    content: Arc<InMemoryContentStore>,
    engine: SchedulerEngine,
}

fn rig() -> Rig {
    let store = Arc::new(MemoryScheduleStore::default());
    let content = Arc::new(InMemoryContentStore::new());
    let correlator = Arc::new(WorkflowCorrelator::new(
        store.clone() as Arc<dyn ScheduleStore>,
        Arc::new(LogWorkflowNotifier),
    ));
    let executor = Arc::new(TransitionExecutor::new(
        store.clone() as Arc<dyn ScheduleStore>,
        content.clone() as Arc<dyn ContentStore>,
        correlator,
        Arc::new(FixedDelay::new(StdDuration::from_millis(1), 2)),
    ));
    let engine = SchedulerEngine::new(
        engine_config(),
        store.clone() as Arc<dyn ScheduleStore>,
        executor,
    );
    Rig {
        store,
        content,
        engine,
    }
}

fn due_publish(store_offset_secs: i64) -> ScheduleEntry {
    ScheduleEntry::new_publish(
        Uuid::new_v4(),
        format!("page-{}", Uuid::new_v4()),
        "en-US",
        Uuid::new_v4(),
        Utc::now() + Duration::seconds(store_offset_secs),
    )
}

/// A scan executes every due entry and leaves future entries pending.
#[tokio::test]
async fn test_scan_executes_due_and_skips_future() {
    let rig = rig();

    let due_a = due_publish(-30);
    let due_b = due_publish(-5);
    let future = due_publish(3600);

    for entry in [&due_a, &due_b, &future] {
        rig.content
            .insert(entry.target(), PublicationState::Unpublished);
        rig.store.create(entry).await.unwrap();
    }

    let dispatched = rig.engine.process_due_entries().await.unwrap();
    assert_eq!(dispatched, 2);

    assert_eq!(
        rig.content.state_of(&due_a.target()),
        Some(PublicationState::Published)
    );
    assert_eq!(
        rig.content.state_of(&due_b.target()),
        Some(PublicationState::Published)
    );
    assert_eq!(
        rig.content.state_of(&future.target()),
        Some(PublicationState::Unpublished)
    );

    assert!(rig.store.get(due_a.id).await.unwrap().is_none());
    assert!(rig.store.get(due_b.id).await.unwrap().is_none());
    assert!(rig.store.get(future.id).await.unwrap().is_some());
}

/// One failing entry never aborts the rest of the batch.
#[tokio::test]
async fn test_partial_failure_isolation() {
    let rig = rig();

    let missing_target = due_publish(-10);
    let healthy = due_publish(-10);
    // Only the healthy entry's target exists in the content store.
    rig.content
        .insert(healthy.target(), PublicationState::Unpublished);

    rig.store.create(&missing_target).await.unwrap();
    rig.store.create(&healthy).await.unwrap();

    let dispatched = rig.engine.process_due_entries().await.unwrap();
    assert_eq!(dispatched, 2);

    // The healthy entry was applied; the missing-target entry was removed
    // as terminal.
    assert_eq!(
        rig.content.state_of(&healthy.target()),
        Some(PublicationState::Published)
    );
    assert!(rig.store.get(missing_target.id).await.unwrap().is_none());
    assert!(rig.store.get(healthy.id).await.unwrap().is_none());
}

/// Two due entries for one target serialize across scans instead of
/// executing concurrently.
#[tokio::test]
async fn test_same_target_entries_serialize_across_scans() {
    let rig = rig();

    let publish = due_publish(-20);
    let unpublish = ScheduleEntry::new_unpublish(
        publish.data_type_id,
        publish.data_id.clone(),
        publish.locale_culture_name.clone(),
        publish.workflow_instance_id,
        Utc::now() - Duration::seconds(10),
    );
    rig.content
        .insert(publish.target(), PublicationState::Unpublished);
    rig.store.create(&publish).await.unwrap();
    rig.store.create(&unpublish).await.unwrap();

    // First scan: the earlier entry wins the claim, the sibling waits.
    let first = rig.engine.process_due_entries().await.unwrap();
    assert_eq!(first, 1);
    assert_eq!(
        rig.content.state_of(&publish.target()),
        Some(PublicationState::Published)
    );
    assert!(rig.store.get(unpublish.id).await.unwrap().is_some());

    // Second scan: the sibling runs.
    let second = rig.engine.process_due_entries().await.unwrap();
    assert_eq!(second, 1);
    assert_eq!(
        rig.content.state_of(&publish.target()),
        Some(PublicationState::Unpublished)
    );
    assert!(rig.store.get(unpublish.id).await.unwrap().is_none());
}

/// An entry that failed transiently is picked up again by a later scan.
#[tokio::test]
async fn test_transient_failure_retried_on_next_scan() {
    let rig = rig();

    let entry = due_publish(-5);
    rig.content
        .insert(entry.target(), PublicationState::Unpublished);
    rig.store.create(&entry).await.unwrap();

    rig.content.set_fail_transiently(true);
    let dispatched = rig.engine.process_due_entries().await.unwrap();
    assert_eq!(dispatched, 1);
    assert!(rig.store.get(entry.id).await.unwrap().is_some());

    rig.content.set_fail_transiently(false);
    let dispatched = rig.engine.process_due_entries().await.unwrap();
    assert_eq!(dispatched, 1);
    assert!(rig.store.get(entry.id).await.unwrap().is_none());
    assert_eq!(
        rig.content.state_of(&entry.target()),
        Some(PublicationState::Published)
    );
}

/// An empty store scans cleanly.
#[tokio::test]
async fn test_empty_scan_dispatches_nothing() {
    let rig = rig();
    let dispatched = rig.engine.process_due_entries().await.unwrap();
    assert_eq!(dispatched, 0);
}

proptest! {
    /// *For any* well-formed configuration, the engine accepts it
    /// unchanged.
    #[test]
    fn property_scheduler_config_round_trip(
        poll_interval in 1u64..3600u64,
        claim_ttl in 5u64..300u64,
        max_entries in 1usize..1000usize,
        concurrency in 1usize..64usize,
    ) {
        let config = SchedulerConfig {
            poll_interval_seconds: poll_interval,
            claim_ttl_seconds: claim_ttl,
            max_entries_per_poll: max_entries,
            worker_concurrency: concurrency,
        };

        prop_assert_eq!(config.poll_interval_seconds, poll_interval);
        prop_assert_eq!(config.claim_ttl_seconds, claim_ttl);
        prop_assert_eq!(config.max_entries_per_poll, max_entries);
        prop_assert_eq!(config.worker_concurrency, concurrency);
    }

    /// *For any* batch size up to the per-poll cap, one scan drains
    /// exactly the due entries.
    #[test]
    fn property_scan_drains_due_batch(batch in 1usize..12usize) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let rig = rig();
            for _ in 0..batch {
                let entry = due_publish(-60);
                rig.content.insert(entry.target(), PublicationState::Unpublished);
                rig.store.create(&entry).await.unwrap();
            }

            let dispatched = rig.engine.process_due_entries().await.unwrap();
            prop_assert_eq!(dispatched, batch);
            prop_assert!(rig.store.is_empty());
            Ok(())
        })?;
    }
}

// Behavior tests for the transition executor

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::content::{ContentStore, InMemoryContentStore};
use common::correlator::{WorkflowCorrelator, WorkflowNotifier};
use common::errors::{ExecutionError, NotifyError};
use common::executor::TransitionExecutor;
use common::models::{
    CompletionOutcome, ContentTarget, PublicationState, ScheduleEntry, ScheduleKind,
};
use common::retry::FixedDelay;
use common::store::{MemoryScheduleStore, ScheduleStore};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;
use uuid::Uuid;

const CLAIM_TTL: StdDuration = StdDuration::from_secs(30);

/// Notifier that records every completion it sees.
#[derive(Default)]
struct RecordingNotifier {
    completions: Mutex<Vec<(Uuid, Uuid, CompletionOutcome)>>,
}

impl RecordingNotifier {
    fn completions(&self) -> Vec<(Uuid, Uuid, CompletionOutcome)> {
        self.completions.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkflowNotifier for RecordingNotifier {
    async fn notify_completed(
        &self,
        workflow_instance_id: Uuid,
        entry_id: Uuid,
        outcome: CompletionOutcome,
    ) -> Result<(), NotifyError> {
        self.completions
            .lock()
            .unwrap()
            .push((workflow_instance_id, entry_id, outcome));
        Ok(())
    }
}

/// Notifier that always fails delivery.
struct FailingNotifier;

#[async_trait]
impl WorkflowNotifier for FailingNotifier {
    async fn notify_completed(
        &self,
        _workflow_instance_id: Uuid,
        _entry_id: Uuid,
        _outcome: CompletionOutcome,
    ) -> Result<(), NotifyError> {
        Err(NotifyError::DeliveryFailed("workflow engine down".into()))
    }
}

struct Fixture {
    store: Arc<MemoryScheduleStore>,
    content: Arc<InMemoryContentStore>,
    notifier: Arc<RecordingNotifier>,
    executor: TransitionExecutor,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryScheduleStore::default());
    let content = Arc::new(InMemoryContentStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let correlator = Arc::new(WorkflowCorrelator::new(
        store.clone() as Arc<dyn ScheduleStore>,
        notifier.clone() as Arc<dyn WorkflowNotifier>,
    ));
    let executor = TransitionExecutor::new(
        store.clone() as Arc<dyn ScheduleStore>,
        content.clone() as Arc<dyn ContentStore>,
        correlator,
        Arc::new(FixedDelay::new(StdDuration::from_millis(1), 3)),
    );
    Fixture {
        store,
        content,
        notifier,
        executor,
    }
}

fn due_entry(kind: ScheduleKind) -> ScheduleEntry {
    ScheduleEntry::new(
        kind,
        Uuid::new_v4(),
        "page-42",
        "en-US",
        Uuid::new_v4(),
        Utc::now() - Duration::seconds(1),
    )
}

async fn create_and_claim(
    fx: &Fixture,
    entry: &ScheduleEntry,
) -> common::store::EntryClaim {
    fx.store.create(entry).await.unwrap();
    fx.store.claim(entry.id, CLAIM_TTL).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_publish_applies_state_and_removes_entry() {
    let fx = fixture();
    let entry = due_entry(ScheduleKind::Publish);
    fx.content
        .insert(entry.target(), PublicationState::Unpublished);

    let claim = create_and_claim(&fx, &entry).await;
    let outcome = fx.executor.execute(&entry, &claim).await.unwrap();

    assert_eq!(outcome, CompletionOutcome::Applied);
    assert_eq!(
        fx.content.state_of(&entry.target()),
        Some(PublicationState::Published)
    );
    assert!(fx.store.get(entry.id).await.unwrap().is_none());
    assert_eq!(
        fx.notifier.completions(),
        vec![(entry.workflow_instance_id, entry.id, CompletionOutcome::Applied)]
    );
}

#[tokio::test]
async fn test_unpublish_is_the_inverse_transition() {
    let fx = fixture();
    let entry = due_entry(ScheduleKind::Unpublish);
    fx.content
        .insert(entry.target(), PublicationState::Published);

    let claim = create_and_claim(&fx, &entry).await;
    let outcome = fx.executor.execute(&entry, &claim).await.unwrap();

    assert_eq!(outcome, CompletionOutcome::Applied);
    assert_eq!(
        fx.content.state_of(&entry.target()),
        Some(PublicationState::Unpublished)
    );
}

/// Executing a publish against an already-published target completes
/// successfully and removes the entry.
#[tokio::test]
async fn test_already_published_target_is_idempotent_success() {
    let fx = fixture();
    let entry = due_entry(ScheduleKind::Publish);
    fx.content
        .insert(entry.target(), PublicationState::Published);

    let claim = create_and_claim(&fx, &entry).await;
    let outcome = fx.executor.execute(&entry, &claim).await.unwrap();

    assert_eq!(outcome, CompletionOutcome::AlreadyApplied);
    assert!(fx.store.get(entry.id).await.unwrap().is_none());
    assert_eq!(
        fx.notifier.completions(),
        vec![(
            entry.workflow_instance_id,
            entry.id,
            CompletionOutcome::AlreadyApplied
        )]
    );
}

/// A deleted target is terminal: the entry is removed, no state change is
/// attempted, and the workflow hears about it.
#[tokio::test]
async fn test_missing_target_removes_entry_without_state_change() {
    let fx = fixture();
    let entry = due_entry(ScheduleKind::Publish);
    // Target never registered with the content store.

    let claim = create_and_claim(&fx, &entry).await;
    let err = fx.executor.execute(&entry, &claim).await.unwrap_err();

    assert!(matches!(err, ExecutionError::TargetNotFound(_)));
    assert!(fx.store.get(entry.id).await.unwrap().is_none());
    assert_eq!(fx.content.state_of(&entry.target()), None);
    assert_eq!(
        fx.notifier.completions(),
        vec![(
            entry.workflow_instance_id,
            entry.id,
            CompletionOutcome::TargetMissing
        )]
    );
}

/// Transient content-service failure exhausts the attempt budget, the
/// claim is released, and the entry stays pending for the next scan.
#[tokio::test]
async fn test_transient_failure_leaves_entry_pending() {
    let fx = fixture();
    let entry = due_entry(ScheduleKind::Publish);
    fx.content
        .insert(entry.target(), PublicationState::Unpublished);
    fx.content.set_fail_transiently(true);

    let claim = create_and_claim(&fx, &entry).await;
    let err = fx.executor.execute(&entry, &claim).await.unwrap_err();

    assert!(matches!(
        err,
        ExecutionError::ContentServiceFailed { .. }
    ));
    assert!(fx.store.get(entry.id).await.unwrap().is_some());
    assert!(fx.notifier.completions().is_empty());

    // The claim was released: the next scan picks the entry up again.
    let due = fx.store.find_due(Utc::now(), 100).await.unwrap();
    assert_eq!(due.len(), 1);

    // Once the service recovers, the retry succeeds end to end.
    fx.content.set_fail_transiently(false);
    let claim = fx.store.claim(entry.id, CLAIM_TTL).await.unwrap().unwrap();
    let outcome = fx.executor.execute(&entry, &claim).await.unwrap();
    assert_eq!(outcome, CompletionOutcome::Applied);
}

/// Notification failure never rolls back an applied transition.
#[tokio::test]
async fn test_notification_failure_does_not_roll_back() {
    let store = Arc::new(MemoryScheduleStore::default());
    let content = Arc::new(InMemoryContentStore::new());
    let correlator = Arc::new(WorkflowCorrelator::new(
        store.clone() as Arc<dyn ScheduleStore>,
        Arc::new(FailingNotifier),
    ));
    let executor = TransitionExecutor::new(
        store.clone() as Arc<dyn ScheduleStore>,
        content.clone() as Arc<dyn ContentStore>,
        correlator,
        Arc::new(FixedDelay::new(StdDuration::from_millis(1), 3)),
    );

    let entry = due_entry(ScheduleKind::Publish);
    content.insert(entry.target(), PublicationState::Unpublished);
    store.create(&entry).await.unwrap();
    let claim = store.claim(entry.id, CLAIM_TTL).await.unwrap().unwrap();

    let outcome = executor.execute(&entry, &claim).await.unwrap();

    assert_eq!(outcome, CompletionOutcome::Applied);
    assert_eq!(
        content.state_of(&entry.target()),
        Some(PublicationState::Published)
    );
    assert!(store.get(entry.id).await.unwrap().is_none());
}

/// The target struct used by the executor matches the entry fields.
#[tokio::test]
async fn test_executor_addresses_the_exact_locale() {
    let fx = fixture();
    let entry = due_entry(ScheduleKind::Publish);
    let other_locale = ContentTarget::new(entry.data_type_id, entry.data_id.clone(), "da-DK");

    fx.content
        .insert(entry.target(), PublicationState::Unpublished);
    fx.content
        .insert(other_locale.clone(), PublicationState::Unpublished);

    let claim = create_and_claim(&fx, &entry).await;
    fx.executor.execute(&entry, &claim).await.unwrap();

    assert_eq!(
        fx.content.state_of(&entry.target()),
        Some(PublicationState::Published)
    );
    // The sibling locale is untouched.
    assert_eq!(
        fx.content.state_of(&other_locale),
        Some(PublicationState::Unpublished)
    );
}

// In-memory content store for tests and embedded use

use super::ContentStore;
use crate::errors::ContentError;
use crate::models::{ContentTarget, PublicationState};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Map-backed [`ContentStore`]; targets must be inserted before the
/// scheduler can transition them.
#[derive(Default)]
pub struct InMemoryContentStore {
    items: Mutex<HashMap<ContentTarget, PublicationState>>,
    /// When set, every call fails with a transient error. Lets tests
    /// exercise the retry path.
    fail_transiently: Mutex<bool>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target with an initial publication state.
    pub fn insert(&self, target: ContentTarget, state: PublicationState) {
        self.items
            .lock()
            .expect("content mutex poisoned")
            .insert(target, state);
    }

    /// Remove a target, simulating content deleted out from under a
    /// pending entry.
    pub fn remove(&self, target: &ContentTarget) {
        self.items
            .lock()
            .expect("content mutex poisoned")
            .remove(target);
    }

    /// Toggle transient failure mode.
    pub fn set_fail_transiently(&self, fail: bool) {
        *self.fail_transiently.lock().expect("content mutex poisoned") = fail;
    }

    /// Direct state lookup for assertions.
    pub fn state_of(&self, target: &ContentTarget) -> Option<PublicationState> {
        self.items
            .lock()
            .expect("content mutex poisoned")
            .get(target)
            .copied()
    }

    fn check_failure(&self) -> Result<(), ContentError> {
        if *self.fail_transiently.lock().expect("content mutex poisoned") {
            return Err(ContentError::ServiceUnavailable(
                "simulated transient failure".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn publication_state(
        &self,
        target: &ContentTarget,
    ) -> Result<Option<PublicationState>, ContentError> {
        self.check_failure()?;
        Ok(self.state_of(target))
    }

    async fn set_publication_state(
        &self,
        target: &ContentTarget,
        state: PublicationState,
    ) -> Result<(), ContentError> {
        self.check_failure()?;
        let mut items = self.items.lock().expect("content mutex poisoned");
        match items.get_mut(target) {
            Some(current) => {
                *current = state;
                Ok(())
            }
            None => Err(ContentError::InvalidResponse(format!(
                "unknown target: {}",
                target
            ))),
        }
    }
}

// Content store collaborator
//
// The scheduler never owns content; it asks the content store for the
// publication state of a target and drives that state. A missing target is
// reported as `None`, not as an error: the executor treats it as terminal.

pub mod http;
pub mod memory;

pub use http::HttpContentService;
pub use memory::InMemoryContentStore;

use crate::errors::ContentError;
use crate::models::{ContentTarget, PublicationState};
use async_trait::async_trait;

/// Access to the publication state of content-item-locale pairs.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Current publication state, or `None` when the target no longer
    /// exists.
    async fn publication_state(
        &self,
        target: &ContentTarget,
    ) -> Result<Option<PublicationState>, ContentError>;

    /// Drive the target into the given publication state. The change is
    /// observable by every consumer of the content store.
    async fn set_publication_state(
        &self,
        target: &ContentTarget,
        state: PublicationState,
    ) -> Result<(), ContentError>;
}

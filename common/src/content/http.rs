// HTTP client for the content store's publication endpoint

use super::ContentStore;
use crate::config::ContentServiceConfig;
use crate::errors::ContentError;
use crate::models::{ContentTarget, PublicationState};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
    state: String,
}

#[derive(Debug, Serialize)]
struct TargetQuery<'a> {
    data_type_id: String,
    data_id: &'a str,
    locale: &'a str,
}

impl<'a> TargetQuery<'a> {
    fn from_target(target: &'a ContentTarget) -> Self {
        Self {
            data_type_id: target.data_type_id.to_string(),
            data_id: &target.data_id,
            locale: &target.locale_culture_name,
        }
    }
}

/// [`ContentStore`] implementation talking to the CMS content service
/// over HTTP.
///
/// `GET {base}/publication-state` reads the state of a target;
/// `PUT {base}/publication-state` drives it. A 404 on either call means
/// the target no longer exists; server errors and transport failures are
/// transient and surface as [`ContentError::ServiceUnavailable`].
pub struct HttpContentService {
    client: Client,
    base_url: String,
}

impl HttpContentService {
    /// Create a new client with the configured request timeout.
    pub fn new(config: &ContentServiceConfig) -> Result<Self, ContentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| {
                ContentError::ServiceUnavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/publication-state", self.base_url)
    }
}

#[async_trait]
impl ContentStore for HttpContentService {
    #[instrument(skip(self, target), fields(target = %target))]
    async fn publication_state(
        &self,
        target: &ContentTarget,
    ) -> Result<Option<PublicationState>, ContentError> {
        let response = self
            .client
            .get(self.endpoint())
            .query(&TargetQuery::from_target(target))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("Target not found in content store");
                Ok(None)
            }
            status if status.is_server_error() => Err(ContentError::ServiceUnavailable(format!(
                "content service returned {}",
                status
            ))),
            status if !status.is_success() => Err(ContentError::InvalidResponse(format!(
                "unexpected status {}",
                status
            ))),
            _ => {
                let doc: StateDocument = response.json().await?;
                let state = PublicationState::from_str(&doc.state)
                    .map_err(ContentError::InvalidResponse)?;
                Ok(Some(state))
            }
        }
    }

    #[instrument(skip(self, target), fields(target = %target, state = %state))]
    async fn set_publication_state(
        &self,
        target: &ContentTarget,
        state: PublicationState,
    ) -> Result<(), ContentError> {
        let response = self
            .client
            .put(self.endpoint())
            .query(&TargetQuery::from_target(target))
            .json(&StateDocument {
                state: state.to_string(),
            })
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ContentError::InvalidResponse(format!(
                "target vanished during transition: {}",
                target
            ))),
            status if status.is_server_error() => Err(ContentError::ServiceUnavailable(format!(
                "content service returned {}",
                status
            ))),
            status if !status.is_success() => Err(ContentError::InvalidResponse(format!(
                "unexpected status {}",
                status
            ))),
            _ => {
                debug!("Publication state applied");
                Ok(())
            }
        }
    }
}

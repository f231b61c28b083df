// Error handling framework

use thiserror::Error;

/// Field-level validation errors raised by the entry schema validator
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Field {0} is immutable once the entry is created")]
    ImmutableField(String),
}

/// Schedule entry store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Store query failed: {0}")]
    QueryFailed(String),

    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error(
        "A pending {kind} entry already exists for target {target}"
    )]
    DuplicateTarget { target: String, kind: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Content service errors
#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Content service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Content service returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl ContentError {
    /// Transient errors are retried with backoff; the entry stays pending
    /// if every attempt fails.
    pub fn is_transient(&self) -> bool {
        matches!(self, ContentError::ServiceUnavailable(_))
    }
}

/// Transition execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Scheduled target no longer exists: {0}")]
    TargetNotFound(String),

    #[error("Target {target} is already in state {state}")]
    TransitionConflict { target: String, state: String },

    #[error("Content service failed after {attempts} attempts: {source}")]
    ContentServiceFailed {
        attempts: u32,
        #[source]
        source: ContentError,
    },

    #[error("Entry {0} is already claimed by another worker")]
    AlreadyClaimed(uuid::Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Workflow notification errors
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to deliver completion notification: {0}")]
    DeliveryFailed(String),
}

// Implement From for common external errors
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                // Unique-violation means a conflicting pending entry for the
                // same (target, kind) pair.
                if db_err.code().as_deref() == Some("23505") {
                    StoreError::DuplicateTarget {
                        target: db_err.message().to_string(),
                        kind: String::new(),
                    }
                } else {
                    StoreError::QueryFailed(db_err.message().to_string())
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                StoreError::ConnectionFailed(err.to_string())
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for ContentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            ContentError::ServiceUnavailable(err.to_string())
        } else {
            ContentError::InvalidResponse(err.to_string())
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Schedule Entry Models
// ============================================================================

/// ScheduleEntry represents a pending deferred publish or unpublish
/// operation on a single content-item-locale pair.
///
/// The four identity fields (`id`, `data_type_id`, `data_id`,
/// `workflow_instance_id`) are fixed at creation; changing any of them
/// means deleting and recreating the entry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduleEntry {
    pub id: Uuid,
    pub data_type_id: Uuid,
    pub data_id: String,
    pub workflow_instance_id: Uuid,
    /// Culture name the operation applies to. Empty string means the
    /// invariant (locale-neutral) scope.
    pub locale_culture_name: String,
    #[sqlx(try_from = "String")]
    pub kind: ScheduleKind,
    /// The entry becomes due once this instant has passed. Firing is
    /// best-effort: never earlier, and within one polling interval after.
    pub effective_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ScheduleEntry {
    /// Create a new pending entry of the given kind.
    pub fn new(
        kind: ScheduleKind,
        data_type_id: Uuid,
        data_id: impl Into<String>,
        locale_culture_name: impl Into<String>,
        workflow_instance_id: Uuid,
        effective_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            data_type_id,
            data_id: data_id.into(),
            workflow_instance_id,
            locale_culture_name: locale_culture_name.into(),
            kind,
            effective_at,
            created_at: Utc::now(),
        }
    }

    /// Create a new pending publish entry.
    pub fn new_publish(
        data_type_id: Uuid,
        data_id: impl Into<String>,
        locale_culture_name: impl Into<String>,
        workflow_instance_id: Uuid,
        effective_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            ScheduleKind::Publish,
            data_type_id,
            data_id,
            locale_culture_name,
            workflow_instance_id,
            effective_at,
        )
    }

    /// Create a new pending unpublish entry.
    pub fn new_unpublish(
        data_type_id: Uuid,
        data_id: impl Into<String>,
        locale_culture_name: impl Into<String>,
        workflow_instance_id: Uuid,
        effective_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            ScheduleKind::Unpublish,
            data_type_id,
            data_id,
            locale_culture_name,
            workflow_instance_id,
            effective_at,
        )
    }

    /// The content-item-locale pair this entry operates on.
    pub fn target(&self) -> ContentTarget {
        ContentTarget {
            data_type_id: self.data_type_id,
            data_id: self.data_id.clone(),
            locale_culture_name: self.locale_culture_name.clone(),
        }
    }

    /// Whether the entry is eligible for execution at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.effective_at <= now
    }

    /// Deterministic scan order: `(effective_at, id)` ascending.
    pub fn scan_key(&self) -> (DateTime<Utc>, Uuid) {
        (self.effective_at, self.id)
    }
}

/// ScheduleKind discriminates the two schedule variants sharing the entry
/// layout: a deferred publish and a deferred unpublish.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Publish,
    Unpublish,
}

impl ScheduleKind {
    /// The publication state the transition drives the target into.
    pub fn desired_state(&self) -> PublicationState {
        match self {
            ScheduleKind::Publish => PublicationState::Published,
            ScheduleKind::Unpublish => PublicationState::Unpublished,
        }
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleKind::Publish => write!(f, "publish"),
            ScheduleKind::Unpublish => write!(f, "unpublish"),
        }
    }
}

impl FromStr for ScheduleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "publish" => Ok(ScheduleKind::Publish),
            "unpublish" => Ok(ScheduleKind::Unpublish),
            _ => Err(format!("Invalid schedule kind: {}", s)),
        }
    }
}

impl TryFrom<String> for ScheduleKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str(&s)
    }
}

// ============================================================================
// Content Target Models
// ============================================================================

/// ContentTarget identifies exactly one content-item-locale pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ContentTarget {
    pub data_type_id: Uuid,
    pub data_id: String,
    pub locale_culture_name: String,
}

impl ContentTarget {
    pub fn new(
        data_type_id: Uuid,
        data_id: impl Into<String>,
        locale_culture_name: impl Into<String>,
    ) -> Self {
        Self {
            data_type_id,
            data_id: data_id.into(),
            locale_culture_name: locale_culture_name.into(),
        }
    }
}

impl fmt::Display for ContentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let locale = if self.locale_culture_name.is_empty() {
            "invariant"
        } else {
            &self.locale_culture_name
        };
        write!(f, "{}/{}/{}", self.data_type_id, self.data_id, locale)
    }
}

/// PublicationState of a content item within one locale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PublicationState {
    Published,
    Unpublished,
}

impl fmt::Display for PublicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublicationState::Published => write!(f, "published"),
            PublicationState::Unpublished => write!(f, "unpublished"),
        }
    }
}

impl FromStr for PublicationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "published" => Ok(PublicationState::Published),
            "unpublished" => Ok(PublicationState::Unpublished),
            _ => Err(format!("Invalid publication state: {}", s)),
        }
    }
}

impl TryFrom<String> for PublicationState {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str(&s)
    }
}

// ============================================================================
// Completion Models
// ============================================================================

/// CompletionOutcome is reported back to the originating workflow once an
/// entry has been executed and removed from the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompletionOutcome {
    /// The transition was applied to the target.
    Applied,
    /// The target was already in the desired state; treated as success.
    AlreadyApplied,
    /// The target no longer exists; the entry was removed without a
    /// state change.
    TargetMissing,
}

impl fmt::Display for CompletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionOutcome::Applied => write!(f, "applied"),
            CompletionOutcome::AlreadyApplied => write!(f, "already_applied"),
            CompletionOutcome::TargetMissing => write!(f, "target_missing"),
        }
    }
}

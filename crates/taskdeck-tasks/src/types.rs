//! Task data model.
//!
//! All types serialize camelCase to match the stored documents. Reads are
//! lenient: every field except the id has a default, and timestamps accept
//! both the `{seconds, nanoseconds}` object and a bare number found on older
//! documents. A field holding `null` or a value of the wrong shape reads as
//! its default, so one odd field never hides the whole task.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use taskdeck_core::{DocumentId, Timestamp, UserId};

/// Document field names.
pub mod fields {
    /// Canonical owner field.
    pub const OWNER: &str = "owner";
    /// Legacy owner field, still written for older readers.
    pub const OWNER_ID_LEGACY: &str = "ownerId";
    /// Title.
    pub const TITLE: &str = "title";
    /// Description.
    pub const DESCRIPTION: &str = "description";
    /// Status.
    pub const STATUS: &str = "status";
    /// Priority.
    pub const PRIORITY: &str = "priority";
    /// Position tiebreaker.
    pub const POSITION: &str = "position";
    /// Due date (`YYYY-MM-DD`).
    pub const DUE_DATE: &str = "dueDate";
    /// Creation timestamp (server-assigned).
    pub const CREATED_AT: &str = "createdAt";
    /// Last-update timestamp (server-assigned).
    pub const UPDATED_AT: &str = "updatedAt";

    /// Fields a patch may not touch.
    pub const PROTECTED: [&str; 5] = ["id", OWNER, OWNER_ID_LEGACY, CREATED_AT, UPDATED_AT];
}

/// Task status: a tri-state cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started.
    #[default]
    Todo,
    /// Being worked on.
    InProgress,
    /// Finished.
    Done,
}

impl TaskStatus {
    /// All statuses in board column order.
    pub const ALL: [Self; 3] = [Self::Todo, Self::InProgress, Self::Done];

    /// The stored string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }

    /// Parse the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(Self::Todo),
            "in_progress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    /// The next status in the cycle `todo -> in_progress -> done -> todo`.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Todo => Self::InProgress,
            Self::InProgress => Self::Done,
            Self::Done => Self::Todo,
        }
    }

    /// Human-readable column label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Todo => "To Do",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
        }
    }
}

/// Advance a status one step around the cycle.
pub fn next_status(current: TaskStatus) -> TaskStatus {
    current.next()
}

/// Task priority. Only affects presentation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Low.
    Low,
    /// Medium.
    #[default]
    Medium,
    /// High.
    High,
}

impl TaskPriority {
    /// The stored string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// A stored time value: a server timestamp object or a bare number.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    /// `{seconds, nanoseconds}` written by the store.
    Timestamp(Timestamp),
    /// A plain number (epoch millis on older documents).
    Number(f64),
}

/// Status filter for queries and list views.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StatusFilter {
    /// Every status.
    #[default]
    All,
    /// A single status.
    Only(TaskStatus),
}

impl StatusFilter {
    /// Whether `status` passes the filter.
    pub fn matches(self, status: TaskStatus) -> bool {
        match self {
            Self::All => true,
            Self::Only(s) => s == status,
        }
    }

    /// Parse `all` or a status string.
    pub fn parse(s: &str) -> Option<Self> {
        if s == "all" {
            Some(Self::All)
        } else {
            TaskStatus::parse(s).map(Self::Only)
        }
    }

    /// The string form (`all` or a status).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Only(s) => s.as_str(),
        }
    }
}

/// A task as read from the `tasks` collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Store-assigned id.
    pub id: DocumentId,
    /// Canonical owner.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserId>,
    /// Legacy owner field.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<UserId>,
    /// Title.
    #[serde(default, deserialize_with = "or_default")]
    pub title: String,
    /// Free-text description.
    #[serde(default, deserialize_with = "or_default")]
    pub description: String,
    /// Status. Unknown values read as `todo`.
    #[serde(default, deserialize_with = "or_default")]
    pub status: TaskStatus,
    /// Priority.
    #[serde(default, deserialize_with = "or_default")]
    pub priority: TaskPriority,
    /// Ordering tiebreaker, epoch millis at creation by default.
    #[serde(default, deserialize_with = "lenient")]
    pub position: Option<f64>,
    /// Optional due date.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Server creation time; `None` until the write has been read back.
    #[serde(default, deserialize_with = "lenient")]
    pub created_at: Option<TimeValue>,
    /// Server update time; `None` until the write has been read back.
    #[serde(default, deserialize_with = "lenient")]
    pub updated_at: Option<TimeValue>,
}

/// Decode a value, falling back to `T::default()` for `null` or a bad shape.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Decode an optional value; `null` or a bad shape reads as `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

impl Task {
    /// The owning user: canonical field first, then the legacy one.
    pub fn effective_owner(&self) -> Option<&UserId> {
        self.owner.as_ref().or(self.owner_id.as_ref())
    }
}

/// Input for creating a task.
#[derive(Clone, Debug, Default)]
pub struct NewTask {
    /// Title (required, non-blank).
    pub title: String,
    /// Description.
    pub description: String,
    /// Initial status (default `todo`).
    pub status: Option<TaskStatus>,
    /// Priority (default `medium`).
    pub priority: Option<TaskPriority>,
    /// Position (default: now, epoch millis).
    pub position: Option<f64>,
    /// Due date.
    pub due_date: Option<NaiveDate>,
}

impl NewTask {
    /// A task with just a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// A partial update. `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskPatch {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New status.
    pub status: Option<TaskStatus>,
    /// New priority.
    pub priority: Option<TaskPriority>,
    /// New position.
    pub position: Option<f64>,
    /// New due date; `Some(None)` clears it.
    pub due_date: Option<Option<NaiveDate>>,
    /// Additional free-form fields merged as-is.
    pub extra: Map<String, Value>,
}

impl TaskPatch {
    /// A patch that only changes the status.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Add a free-form field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.extra.insert(name.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn next_status_cycle() {
        assert_eq!(next_status(TaskStatus::Todo), TaskStatus::InProgress);
        assert_eq!(next_status(TaskStatus::InProgress), TaskStatus::Done);
        assert_eq!(next_status(TaskStatus::Done), TaskStatus::Todo);
    }

    #[test]
    fn status_string_forms() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                json!(status.as_str())
            );
        }
        assert_eq!(TaskStatus::parse("archived"), None);
    }

    #[test]
    fn status_filter() {
        assert!(StatusFilter::All.matches(TaskStatus::Done));
        assert!(StatusFilter::Only(TaskStatus::Todo).matches(TaskStatus::Todo));
        assert!(!StatusFilter::Only(TaskStatus::Todo).matches(TaskStatus::Done));
        assert_eq!(StatusFilter::parse("all"), Some(StatusFilter::All));
        assert_eq!(
            StatusFilter::parse("in_progress"),
            Some(StatusFilter::Only(TaskStatus::InProgress))
        );
        assert_eq!(StatusFilter::parse("nope"), None);
    }

    #[test]
    fn decodes_timestamp_and_number_created_at() {
        let a: Task = serde_json::from_value(json!({
            "id": "a", "createdAt": {"seconds": 100, "nanoseconds": 0}
        }))
        .unwrap();
        assert!(matches!(a.created_at, Some(TimeValue::Timestamp(ts)) if ts.seconds == 100));

        let b: Task = serde_json::from_value(json!({"id": "b", "createdAt": 200})).unwrap();
        assert_eq!(b.created_at, Some(TimeValue::Number(200.0)));
    }

    #[test]
    fn decodes_sparse_document_with_defaults() {
        let t: Task = serde_json::from_value(json!({"id": "x", "position": 999})).unwrap();
        assert_eq!(t.status, TaskStatus::Todo);
        assert_eq!(t.priority, TaskPriority::Medium);
        assert_eq!(t.position, Some(999.0));
        assert!(t.created_at.is_none());
        assert!(t.title.is_empty());
    }

    #[test]
    fn effective_owner_falls_back_to_legacy() {
        let legacy: Task = serde_json::from_value(json!({"id": "x", "ownerId": "u1"})).unwrap();
        assert_eq!(legacy.effective_owner().map(UserId::as_str), Some("u1"));

        let both: Task =
            serde_json::from_value(json!({"id": "x", "owner": "u2", "ownerId": "u1"})).unwrap();
        assert_eq!(both.effective_owner().map(UserId::as_str), Some("u2"));
    }

    #[test]
    fn due_date_round_trips_as_iso_date() {
        let t: Task = serde_json::from_value(json!({"id": "x", "dueDate": "2024-05-06"})).unwrap();
        assert_eq!(t.due_date, NaiveDate::from_ymd_opt(2024, 5, 6));
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["dueDate"], "2024-05-06");
    }

    #[test]
    fn unusable_created_at_reads_as_missing() {
        let t: Task = serde_json::from_value(json!({
            "id": "x", "createdAt": "2024-01-01", "updatedAt": {"when": 1}, "position": 5
        }))
        .unwrap();
        assert!(t.created_at.is_none());
        assert!(t.updated_at.is_none());
        assert_eq!(t.position, Some(5.0));
    }

    #[test]
    fn null_and_unknown_fields_fall_back_to_defaults() {
        let t: Task = serde_json::from_value(json!({
            "id": "x",
            "title": null,
            "description": null,
            "status": "in-progress",
            "priority": 3,
            "position": "soon",
            "dueDate": "someday",
            "owner": null,
            "ownerId": "u1"
        }))
        .unwrap();
        assert!(t.title.is_empty());
        assert!(t.description.is_empty());
        assert_eq!(t.status, TaskStatus::Todo);
        assert_eq!(t.priority, TaskPriority::Medium);
        assert!(t.position.is_none());
        assert!(t.due_date.is_none());
        assert_eq!(t.effective_owner().map(UserId::as_str), Some("u1"));
    }
}

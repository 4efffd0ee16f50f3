//! Task store client.
//!
//! Translates task intents into document operations on the `tasks`
//! collection. Key rules:
//!
//! - **Owner stamping**: creates write both `owner` and the legacy `ownerId`.
//! - **Server timestamps**: `createdAt`/`updatedAt` are assigned at commit; a
//!   freshly created [`Task`] carries `None` for both until read back.
//! - **Read-repair**: before any owner-scoped read, documents carrying only
//!   the legacy `ownerId` get the canonical `owner` written onto them, so
//!   queries only ever filter on `owner`.
//! - **Unified ordering**: every list handed out is sorted by
//!   [`sort_tasks_unified`](crate::sort::sort_tasks_unified).

use std::sync::Arc;

use serde_json::Value;
use taskdeck_core::{DocumentId, UserId, now_millis};
use taskdeck_store::{
    Direction, Document, DocumentStore, DocumentWrite, ListenerRegistration, Query,
};
use tracing::{debug, info, warn};

use crate::errors::TaskError;
use crate::sort::sorted_unified;
use crate::types::{NewTask, StatusFilter, Task, TaskPatch, TaskStatus, fields};

/// Name of the task collection.
pub const TASKS_COLLECTION: &str = "tasks";

/// Handle to a live task query. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    registration: ListenerRegistration,
}

impl Subscription {
    /// Stop receiving snapshots. Safe to call repeatedly.
    pub fn unsubscribe(&mut self) {
        self.registration.remove();
    }

    /// Whether snapshots are still being delivered.
    pub fn is_active(&self) -> bool {
        self.registration.is_active()
    }
}

/// Task service over a document store. Cheap to clone.
#[derive(Clone, Debug)]
pub struct TaskService {
    store: DocumentStore,
}

impl TaskService {
    /// Create a service over `store`.
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────

    /// Create a task owned by `owner_id`.
    ///
    /// Returns immediately with the assigned id; `created_at`/`updated_at`
    /// are `None` placeholders until the next read or snapshot.
    pub fn create_task(&self, owner_id: &UserId, new: NewTask) -> Result<Task, TaskError> {
        if owner_id.trim().is_empty() {
            return Err(TaskError::Validation("owner id is required".to_string()));
        }
        let title = new.title.trim();
        if title.is_empty() {
            return Err(TaskError::Validation("title is required".to_string()));
        }

        let status = new.status.unwrap_or_default();
        let priority = new.priority.unwrap_or_default();
        #[allow(clippy::cast_precision_loss)]
        let position = new.position.unwrap_or_else(|| now_millis() as f64);

        let mut write = DocumentWrite::new()
            .set(fields::OWNER, owner_id.as_str())
            .set(fields::OWNER_ID_LEGACY, owner_id.as_str())
            .set(fields::TITLE, title)
            .set(fields::DESCRIPTION, new.description.as_str())
            .set(fields::STATUS, status.as_str())
            .set(fields::PRIORITY, priority.as_str())
            .set(fields::POSITION, position)
            .server_timestamp(fields::CREATED_AT)
            .server_timestamp(fields::UPDATED_AT);
        if let Some(due) = new.due_date {
            write = write.set(fields::DUE_DATE, due.to_string());
        }

        let id = self.store.add(TASKS_COLLECTION, write)?;
        info!(task_id = %id, owner = %owner_id, "task created");

        Ok(Task {
            id,
            owner: Some(owner_id.clone()),
            owner_id: Some(owner_id.clone()),
            title: title.to_string(),
            description: new.description,
            status,
            priority,
            position: Some(position),
            due_date: new.due_date,
            created_at: None,
            updated_at: None,
        })
    }

    /// Merge `patch` into a task, stamping `updatedAt`.
    pub fn update_task(&self, id: &DocumentId, patch: TaskPatch) -> Result<(), TaskError> {
        let write = patch_to_write(patch)?;
        self.store
            .update(TASKS_COLLECTION, id, write)
            .map_err(|e| TaskError::from_store(e, id))?;
        debug!(task_id = %id, "task updated");
        Ok(())
    }

    /// Advance a task's status one step and persist it. Returns the new status.
    pub fn toggle_status(
        &self,
        id: &DocumentId,
        current: TaskStatus,
    ) -> Result<TaskStatus, TaskError> {
        let next = current.next();
        self.update_task(id, TaskPatch::status(next))?;
        Ok(next)
    }

    /// Delete a task outright. Returns `false` if it was already gone.
    pub fn delete_task(&self, id: &DocumentId) -> Result<bool, TaskError> {
        let removed = self.store.delete(TASKS_COLLECTION, id)?;
        if removed {
            info!(task_id = %id, "task deleted");
        } else {
            debug!(task_id = %id, "delete of missing task");
        }
        Ok(removed)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    /// Read a single task.
    pub fn get_task(&self, id: &DocumentId) -> Result<Option<Task>, TaskError> {
        self.store
            .get(TASKS_COLLECTION, id)?
            .map(|doc| doc.decode::<Task>().map_err(TaskError::from))
            .transpose()
    }

    /// One-shot fetch of a user's tasks, status-filtered and sorted.
    pub fn get_tasks_by_owner(
        &self,
        owner_id: &UserId,
        filter: StatusFilter,
    ) -> Result<Vec<Task>, TaskError> {
        require_owner(owner_id)?;
        let _ = self.repair_legacy_owner(owner_id)?;

        let docs = self.store.query(&owner_query(owner_id))?;
        let tasks = decode_tasks(&docs)
            .into_iter()
            .filter(|t| filter.matches(t.status))
            .collect();
        Ok(sorted_unified(tasks))
    }

    /// Live query of a user's tasks.
    ///
    /// `on_snapshot` receives the full, sorted result on subscription and
    /// after every change to the collection. Must be called within a tokio
    /// runtime. The returned [`Subscription`] must be kept alive; dropping it
    /// unsubscribes.
    pub fn subscribe_tasks_by_owner<F>(
        &self,
        owner_id: &UserId,
        filter: StatusFilter,
        on_snapshot: F,
    ) -> Result<Subscription, TaskError>
    where
        F: Fn(Vec<Task>) + Send + Sync + 'static,
    {
        require_owner(owner_id)?;
        let _ = self.repair_legacy_owner(owner_id)?;

        let mut query = owner_query(owner_id);
        if let StatusFilter::Only(status) = filter {
            query = query.where_eq(fields::STATUS, status.as_str());
        }

        let owner = owner_id.clone();
        let registration = self.store.listen(
            query,
            Arc::new(move |docs: Vec<Document>| {
                let tasks = sorted_unified(decode_tasks(&docs));
                debug!(owner = %owner, count = tasks.len(), "task snapshot");
                on_snapshot(tasks);
            }),
        )?;
        info!(owner = %owner_id, filter = filter.as_str(), "task subscription opened");
        Ok(Subscription { registration })
    }

    /// Write the canonical `owner` onto documents that only carry the legacy
    /// `ownerId` for this user. Returns how many were repaired.
    pub fn repair_legacy_owner(&self, owner_id: &UserId) -> Result<usize, TaskError> {
        let legacy = self.store.query(
            &Query::collection(TASKS_COLLECTION)
                .where_eq(fields::OWNER_ID_LEGACY, owner_id.as_str())
                .where_eq(fields::OWNER, Value::Null),
        )?;
        for doc in &legacy {
            self.store.update(
                TASKS_COLLECTION,
                &doc.id,
                DocumentWrite::new().set(fields::OWNER, owner_id.as_str()),
            )?;
        }
        if !legacy.is_empty() {
            warn!(
                owner = %owner_id,
                repaired = legacy.len(),
                "repaired tasks missing canonical owner field"
            );
        }
        Ok(legacy.len())
    }
}

fn require_owner(owner_id: &UserId) -> Result<(), TaskError> {
    if owner_id.trim().is_empty() {
        Err(TaskError::Validation("owner id is required".to_string()))
    } else {
        Ok(())
    }
}

fn owner_query(owner_id: &UserId) -> Query {
    Query::collection(TASKS_COLLECTION)
        .where_eq(fields::OWNER, owner_id.as_str())
        .order_by(fields::CREATED_AT, Direction::Descending)
}

/// Decode documents, skipping (and logging) any that do not parse as tasks.
fn decode_tasks(docs: &[Document]) -> Vec<Task> {
    docs.iter()
        .filter_map(|doc| match doc.decode::<Task>() {
            Ok(task) => Some(task),
            Err(e) => {
                warn!(task_id = %doc.id, error = %e, "skipping undecodable task");
                None
            }
        })
        .collect()
}

fn patch_to_write(patch: TaskPatch) -> Result<DocumentWrite, TaskError> {
    if let Some(title) = &patch.title {
        if title.trim().is_empty() {
            return Err(TaskError::Validation("title is required".to_string()));
        }
    }
    if let Some(field) = patch
        .extra
        .keys()
        .find(|k| fields::PROTECTED.contains(&k.as_str()))
    {
        return Err(TaskError::Validation(format!("field {field} cannot be patched")));
    }

    let mut write = DocumentWrite::from_map(patch.extra);
    if let Some(title) = patch.title {
        write = write.set(fields::TITLE, title.trim());
    }
    if let Some(description) = patch.description {
        write = write.set(fields::DESCRIPTION, description);
    }
    if let Some(status) = patch.status {
        write = write.set(fields::STATUS, status.as_str());
    }
    if let Some(priority) = patch.priority {
        write = write.set(fields::PRIORITY, priority.as_str());
    }
    if let Some(position) = patch.position {
        write = write.set(fields::POSITION, position);
    }
    if let Some(due) = patch.due_date {
        write = write.set(
            fields::DUE_DATE,
            due.map_or(Value::Null, |d| Value::String(d.to_string())),
        );
    }
    Ok(write.server_timestamp(fields::UPDATED_AT))
}

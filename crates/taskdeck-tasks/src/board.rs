//! Kanban and list view state.
//!
//! The board is a local cache of the last snapshot, split into one column
//! per status. Remote snapshots replace it wholesale. A cross-column drop
//! moves the card optimistically and persists the new status, reverting if
//! the write fails. Reordering within a column is local only and is lost on
//! the next snapshot.

use std::collections::BTreeMap;

use taskdeck_core::DocumentId;
use tracing::{debug, error};

use crate::errors::TaskError;
use crate::service::TaskService;
use crate::sort::sorted_unified;
use crate::types::{StatusFilter, Task, TaskPatch, TaskStatus};

/// Result of a drop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropOutcome {
    /// Moved within its column; nothing persisted.
    Reordered,
    /// Moved to another column and the status change was persisted.
    Moved {
        /// Column the card left.
        from: TaskStatus,
        /// Column the card joined.
        to: TaskStatus,
    },
}

/// Board columns keyed by status.
#[derive(Clone, Debug, Default)]
pub struct KanbanBoard {
    columns: BTreeMap<TaskStatus, Vec<Task>>,
}

impl KanbanBoard {
    /// Build a board from a task list.
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let mut board = Self::default();
        board.apply_snapshot(tasks);
        board
    }

    /// Replace all local state with a remote snapshot.
    pub fn apply_snapshot(&mut self, tasks: Vec<Task>) {
        self.columns = TaskStatus::ALL.iter().map(|s| (*s, Vec::new())).collect();
        for task in sorted_unified(tasks) {
            self.columns.entry(task.status).or_default().push(task);
        }
    }

    /// Cards in a column, top first.
    pub fn column(&self, status: TaskStatus) -> &[Task] {
        self.columns.get(&status).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of cards.
    pub fn len(&self) -> usize {
        self.columns.values().map(Vec::len).sum()
    }

    /// Whether the board has no cards.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Locate a card by id.
    pub fn find(&self, id: &DocumentId) -> Option<(TaskStatus, usize)> {
        self.columns.iter().find_map(|(status, tasks)| {
            tasks.iter().position(|t| &t.id == id).map(|i| (*status, i))
        })
    }

    /// Drop a card into `target` at `index` (clamped to the column length).
    pub fn drop_task(
        &mut self,
        service: &TaskService,
        id: &DocumentId,
        target: TaskStatus,
        index: usize,
    ) -> Result<DropOutcome, TaskError> {
        let (source, from_index) = self
            .find(id)
            .ok_or_else(|| TaskError::task_not_found(id.as_str()))?;

        let mut task = self.take(source, from_index);
        if source == target {
            let _ = self.insert(target, index, task);
            debug!(task_id = %id, "card reordered");
            return Ok(DropOutcome::Reordered);
        }

        task.status = target;
        let at = self.insert(target, index, task);

        if let Err(e) = service.update_task(id, TaskPatch::status(target)) {
            error!(task_id = %id, error = %e, "status update failed, reverting move");
            let mut task = self.take(target, at);
            task.status = source;
            let _ = self.insert(source, from_index, task);
            return Err(e);
        }
        debug!(task_id = %id, from = source.as_str(), to = target.as_str(), "card moved");
        Ok(DropOutcome::Moved {
            from: source,
            to: target,
        })
    }

    fn take(&mut self, status: TaskStatus, index: usize) -> Task {
        self.columns.entry(status).or_default().remove(index)
    }

    fn insert(&mut self, status: TaskStatus, index: usize, task: Task) -> usize {
        let column = self.columns.entry(status).or_default();
        let at = index.min(column.len());
        column.insert(at, task);
        at
    }
}

/// Flat list projection: unified order, optional status filter, and a
/// case-insensitive search over title and description.
pub fn list_view(tasks: &[Task], filter: StatusFilter, search: &str) -> Vec<Task> {
    let needle = search.trim().to_lowercase();
    let matching = tasks
        .iter()
        .filter(|t| filter.matches(t.status))
        .filter(|t| {
            needle.is_empty()
                || t.title.to_lowercase().contains(&needle)
                || t.description.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect();
    sorted_unified(matching)
}

//! The unified task ordering.
//!
//! One-shot fetches and live snapshots both pass through
//! [`sort_tasks_unified`], so switching between them never reorders the list.
//!
//! Effective score, descending:
//! 1. `createdAt.seconds` when `createdAt` is a timestamp object
//! 2. the number itself when `createdAt` is numeric
//! 3. `position` when there is no usable timestamp
//!
//! A task with a timestamp always ranks ahead of one scored by `position`
//! alone, and a task with neither ranks last. Equal keys keep their incoming
//! order.

use std::cmp::Ordering;

use crate::types::{Task, TimeValue};

/// The effective ordering key of a task.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SortKey {
    /// Scored from `createdAt`.
    Timestamp(f64),
    /// Scored from `position` (no usable timestamp).
    Position(f64),
    /// Neither field present.
    Missing,
}

impl SortKey {
    fn tier(self) -> u8 {
        match self {
            Self::Timestamp(_) => 2,
            Self::Position(_) => 1,
            Self::Missing => 0,
        }
    }

    fn score(self) -> f64 {
        match self {
            Self::Timestamp(v) | Self::Position(v) => v,
            Self::Missing => 0.0,
        }
    }
}

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tier()
            .cmp(&other.tier())
            .then_with(|| self.score().total_cmp(&other.score()))
    }
}

/// Compute the effective ordering key of a task.
pub fn effective_sort_key(task: &Task) -> SortKey {
    match task.created_at {
        #[allow(clippy::cast_precision_loss)]
        Some(TimeValue::Timestamp(ts)) => SortKey::Timestamp(ts.seconds as f64),
        Some(TimeValue::Number(n)) => SortKey::Timestamp(n),
        None => task.position.map_or(SortKey::Missing, SortKey::Position),
    }
}

/// Sort tasks in place, highest effective score first. Stable.
pub fn sort_tasks_unified(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| effective_sort_key(b).cmp(&effective_sort_key(a)));
}

/// Owned convenience wrapper around [`sort_tasks_unified`].
#[must_use]
pub fn sorted_unified(mut tasks: Vec<Task>) -> Vec<Task> {
    sort_tasks_unified(&mut tasks);
    tasks
}

//! # taskdeck-tasks
//!
//! Owner-scoped task management over the document store.
//!
//! - [`TaskService`]: create/read/update/delete, legacy owner repair, live subscriptions
//! - [`sort_tasks_unified`]: the single ordering every list view uses
//! - [`TaskFeed`]: `{tasks, loading, error}` state kept current by a subscription
//! - [`KanbanBoard`] / [`list_view`] / [`CalendarMonth`]: view projections

#![deny(unsafe_code)]

pub mod board;
pub mod calendar;
pub mod errors;
pub mod feed;
pub mod service;
pub mod sort;
pub mod types;

pub use board::{DropOutcome, KanbanBoard, list_view};
pub use calendar::{CalendarDay, CalendarMonth, task_day};
pub use errors::{TaskAction, TaskError};
pub use feed::{FeedState, TaskFeed};
pub use service::{Subscription, TASKS_COLLECTION, TaskService};
pub use sort::{SortKey, effective_sort_key, sort_tasks_unified, sorted_unified};
pub use types::{
    NewTask, StatusFilter, Task, TaskPatch, TaskPriority, TaskStatus, TimeValue, next_status,
};

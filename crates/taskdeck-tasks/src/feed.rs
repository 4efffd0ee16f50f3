//! Live task feed.
//!
//! A [`TaskFeed`] owns one subscription for one `(owner, filter)` pair and
//! publishes `{tasks, loading, error}` on a watch channel. Changing the owner
//! or the filter tears the old subscription down before opening a new one;
//! snapshots still in flight for the old pair are discarded by generation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use taskdeck_core::UserId;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::errors::TaskAction;
use crate::service::{Subscription, TaskService};
use crate::types::{StatusFilter, Task};

/// What a feed currently shows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeedState {
    /// Latest task list, unified-sorted.
    pub tasks: Vec<Task>,
    /// True between (re)subscribing and the first snapshot.
    pub loading: bool,
    /// Display message for the last failure, cleared by the next snapshot.
    pub error: Option<String>,
}

/// A live, owner-scoped task list.
#[derive(Debug)]
pub struct TaskFeed {
    service: TaskService,
    owner: Option<UserId>,
    filter: StatusFilter,
    state: Arc<watch::Sender<FeedState>>,
    generation: Arc<AtomicU64>,
    subscription: Option<Subscription>,
}

impl TaskFeed {
    /// Open a feed. With no owner the feed stays idle and empty.
    ///
    /// Must be called within a tokio runtime when an owner is given.
    pub fn open(service: TaskService, owner: Option<UserId>, filter: StatusFilter) -> Self {
        let (state, _) = watch::channel(FeedState::default());
        let mut feed = Self {
            service,
            owner: None,
            filter,
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
            subscription: None,
        };
        feed.set_query(owner, filter);
        feed
    }

    /// Point the feed at a new owner and/or filter, resubscribing.
    pub fn set_query(&mut self, owner: Option<UserId>, filter: StatusFilter) {
        self.close();
        self.owner = owner;
        self.filter = filter;

        let Some(owner) = self.owner.clone() else {
            let _ = self.state.send_replace(FeedState::default());
            return;
        };

        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let generation = self.generation.load(Ordering::SeqCst);
        let current = Arc::clone(&self.generation);
        let state = Arc::clone(&self.state);
        let result = self
            .service
            .subscribe_tasks_by_owner(&owner, filter, move |tasks| {
                if !publish(&state, &current, generation, tasks) {
                    debug!("dropping stale feed snapshot");
                }
            });

        match result {
            Ok(subscription) => {
                info!(owner = %owner, filter = filter.as_str(), "task feed opened");
                self.subscription = Some(subscription);
            }
            Err(e) => {
                error!(owner = %owner, error = %e, "task feed subscription failed");
                self.fail(TaskAction::Load);
            }
        }
    }

    /// One-shot fetch that overwrites the current tasks. The live
    /// subscription stays in place; whichever result lands last wins.
    pub fn refresh(&self) {
        let Some(owner) = &self.owner else {
            return;
        };
        match self.service.get_tasks_by_owner(owner, self.filter) {
            Ok(tasks) => {
                self.state.send_modify(|s| {
                    s.tasks = tasks;
                    s.loading = false;
                    s.error = None;
                });
            }
            Err(e) => {
                error!(owner = %owner, error = %e, "task refresh failed");
                self.fail(TaskAction::Load);
            }
        }
    }

    /// Current state.
    pub fn state(&self) -> FeedState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn watch(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    /// The owner this feed is scoped to.
    pub fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    /// The active status filter.
    pub fn filter(&self) -> StatusFilter {
        self.filter
    }

    /// Tear down the subscription. No-op when already closed.
    pub fn close(&mut self) {
        // bumped under the state lock so no older snapshot can land after
        let _ = self.state.send_if_modified(|_| {
            let _ = self.generation.fetch_add(1, Ordering::SeqCst);
            false
        });
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
            debug!("task feed closed");
        }
    }

    fn fail(&self, action: TaskAction) {
        self.state.send_modify(|s| {
            s.loading = false;
            s.error = Some(action.failure_message().to_string());
        });
    }
}

/// Store a snapshot unless its subscription has been superseded. The check
/// and the write happen under the state lock.
fn publish(
    state: &watch::Sender<FeedState>,
    current: &AtomicU64,
    generation: u64,
    tasks: Vec<Task>,
) -> bool {
    state.send_if_modified(|s| {
        if current.load(Ordering::SeqCst) != generation {
            return false;
        }
        *s = FeedState {
            tasks,
            loading: false,
            error: None,
        };
        true
    })
}

impl Drop for TaskFeed {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use taskdeck_store::DocumentStore;

    use super::*;
    use crate::types::{NewTask, TaskStatus};

    fn service() -> TaskService {
        TaskService::new(DocumentStore::open_in_memory().unwrap())
    }

    async fn settled(rx: &mut watch::Receiver<FeedState>, len: usize) -> FeedState {
        tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| !s.loading && s.tasks.len() == len),
        )
        .await
        .expect("state in time")
        .expect("sender alive")
        .clone()
    }

    #[tokio::test]
    async fn loads_then_follows_writes() {
        let svc = service();
        let _ = svc.create_task(&UserId::from("u1"), NewTask::titled("a")).unwrap();

        let feed = TaskFeed::open(svc.clone(), Some(UserId::from("u1")), StatusFilter::All);
        let mut rx = feed.watch();
        let state = settled(&mut rx, 1).await;
        assert!(state.error.is_none());

        let _ = svc.create_task(&UserId::from("u1"), NewTask::titled("b")).unwrap();
        let _ = settled(&mut rx, 2).await;
    }

    #[tokio::test]
    async fn no_owner_is_idle() {
        let feed = TaskFeed::open(service(), None, StatusFilter::All);
        assert_eq!(feed.state(), FeedState::default());
        feed.refresh();
        assert_eq!(feed.state(), FeedState::default());
    }

    #[tokio::test]
    async fn subscribe_failure_sets_error() {
        let feed = TaskFeed::open(service(), Some(UserId::from("")), StatusFilter::All);
        let state = feed.state();
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("Failed to load tasks"));
    }

    #[tokio::test]
    async fn switching_owner_replaces_tasks() {
        let svc = service();
        let _ = svc.create_task(&UserId::from("u1"), NewTask::titled("a")).unwrap();
        let _ = svc.create_task(&UserId::from("u2"), NewTask::titled("b")).unwrap();
        let _ = svc.create_task(&UserId::from("u2"), NewTask::titled("c")).unwrap();

        let mut feed = TaskFeed::open(svc, Some(UserId::from("u1")), StatusFilter::All);
        let mut rx = feed.watch();
        let _ = settled(&mut rx, 1).await;

        feed.set_query(Some(UserId::from("u2")), StatusFilter::All);
        let state = settled(&mut rx, 2).await;
        assert!(state.tasks.iter().all(|t| t.owner.as_deref() == Some("u2")));
    }

    #[tokio::test]
    async fn filter_change_resubscribes() {
        let svc = service();
        let owner = UserId::from("u1");
        let _ = svc.create_task(&owner, NewTask::titled("a")).unwrap();
        let _ = svc
            .create_task(
                &owner,
                NewTask {
                    status: Some(TaskStatus::Done),
                    ..NewTask::titled("b")
                },
            )
            .unwrap();

        let mut feed = TaskFeed::open(svc, Some(owner.clone()), StatusFilter::All);
        let mut rx = feed.watch();
        let _ = settled(&mut rx, 2).await;

        feed.set_query(Some(owner), StatusFilter::Only(TaskStatus::Done));
        let state = settled(&mut rx, 1).await;
        assert_eq!(state.tasks[0].status, TaskStatus::Done);
        assert_eq!(feed.filter(), StatusFilter::Only(TaskStatus::Done));
    }

    #[tokio::test]
    async fn refresh_overwrites_tasks() {
        let svc = service();
        let owner = UserId::from("u1");
        let feed = TaskFeed::open(svc.clone(), Some(owner.clone()), StatusFilter::All);
        let mut rx = feed.watch();
        let _ = settled(&mut rx, 0).await;

        let _ = svc.create_task(&owner, NewTask::titled("a")).unwrap();
        feed.refresh();
        assert_eq!(feed.state().tasks.len(), 1);
    }

    #[test]
    fn superseded_snapshot_is_dropped() {
        let (state, _) = watch::channel(FeedState {
            loading: true,
            ..FeedState::default()
        });
        let current = AtomicU64::new(1);
        let task: Task = serde_json::from_value(serde_json::json!({"id": "old"})).unwrap();

        assert!(!publish(&state, &current, 0, vec![task.clone()]));
        assert!(state.borrow().loading);
        assert!(state.borrow().tasks.is_empty());

        assert!(publish(&state, &current, 1, vec![task]));
        assert!(!state.borrow().loading);
        assert_eq!(state.borrow().tasks.len(), 1);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut feed = TaskFeed::open(service(), Some(UserId::from("u1")), StatusFilter::All);
        feed.close();
        feed.close();
        assert_eq!(feed.owner().map(UserId::as_str), Some("u1"));
    }
}

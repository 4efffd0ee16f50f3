//! Application context.
//!
//! One [`AppContext`] is built at startup and owns every long-lived piece:
//! the store, the task and auth services, the user context, client storage
//! and the toast queue. Dropping it tears everything down.
//!
//! Action methods here are the layer that turns failures into user-facing
//! state: they log the error and push a toast instead of returning it.

use taskdeck_auth::{
    AuthError, AuthService, AuthUser, DemoPopup, PopupFlow, ProfileService, Provider,
    SignInOutcome, UserContext, UserState,
};
use taskdeck_core::logging::{init_json_subscriber, init_subscriber};
use taskdeck_core::{DocumentId, UserId};
use taskdeck_settings::{StoreSettings, TaskdeckSettings, expand_home};
use taskdeck_store::{ConnectionConfig, DocumentStore, connection};
use taskdeck_tasks::{
    DropOutcome, KanbanBoard, NewTask, StatusFilter, Task, TaskAction, TaskError, TaskFeed,
    TaskPatch, TaskService, TaskStatus,
};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::client_storage::{ClientStorage, Theme};
use crate::errors::Result;
use crate::notifications::Notifications;
use crate::routes::{RouteDecision, guard};

/// Root application state.
#[derive(Debug)]
pub struct AppContext {
    settings: TaskdeckSettings,
    store: DocumentStore,
    tasks: TaskService,
    auth: AuthService,
    profiles: ProfileService,
    user: UserContext,
    storage: ClientStorage,
    notifications: Notifications,
}

impl AppContext {
    /// Build the context from settings: logging, store, client storage.
    /// Must be called within a tokio runtime.
    pub fn bootstrap(settings: TaskdeckSettings) -> Result<Self> {
        if settings.logging.json {
            init_json_subscriber(&settings.logging.level);
        } else {
            init_subscriber(&settings.logging.level);
        }
        let store = open_store(&settings.store)?;
        let storage = ClientStorage::open(&expand_home(&settings.client.storage_path));
        Self::with_parts(settings, store, storage)
    }

    /// Build the context around an existing store and client storage.
    pub fn with_parts(
        settings: TaskdeckSettings,
        store: DocumentStore,
        storage: ClientStorage,
    ) -> Result<Self> {
        let tasks = TaskService::new(store.clone());
        let auth = AuthService::new(store.clone(), settings.auth.clone());
        let profiles = ProfileService::new(store.clone());

        if settings.auth.mock_mode {
            start_mock_session(&auth, &storage)?;
        }
        let user = UserContext::start(&auth, profiles.clone());

        info!(mock_mode = settings.auth.mock_mode, "app context ready");
        Ok(Self {
            settings,
            store,
            tasks,
            auth,
            profiles,
            user,
            storage,
            notifications: Notifications::new(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    /// Effective settings.
    pub fn settings(&self) -> &TaskdeckSettings {
        &self.settings
    }

    /// The document store.
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Task service.
    pub fn tasks(&self) -> &TaskService {
        &self.tasks
    }

    /// Auth service.
    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    /// Profile service.
    pub fn profiles(&self) -> &ProfileService {
        &self.profiles
    }

    /// Current user state.
    pub fn user(&self) -> UserState {
        self.user.state()
    }

    /// Receiver for user state changes.
    pub fn watch_user(&self) -> watch::Receiver<UserState> {
        self.user.watch()
    }

    /// Client storage.
    pub fn storage(&self) -> &ClientStorage {
        &self.storage
    }

    /// Toast queue.
    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    /// Stored theme, else the configured default.
    pub fn theme(&self) -> Theme {
        self.storage
            .theme()
            .or_else(|| Theme::parse(&self.settings.client.default_theme))
            .unwrap_or_default()
    }

    /// Decide a navigation against the current session.
    pub fn navigate(&self, path: &str) -> RouteDecision {
        guard(path, self.auth.current_session().is_some())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Auth actions
    // ─────────────────────────────────────────────────────────────────────

    /// Email/password sign-in. Returns whether it succeeded.
    pub fn sign_in_with_password(&self, email: &str, password: &str) -> bool {
        match self.auth.sign_in_with_password(email, password) {
            Ok(session) => {
                self.ensure_profile(&session.user);
                true
            }
            Err(e) => self.report_auth(&e),
        }
    }

    /// Email/password sign-up. Returns whether it succeeded.
    pub fn sign_up_with_password(&self, email: &str, password: &str, display_name: Option<&str>) -> bool {
        match self.auth.sign_up_with_password(email, password, display_name) {
            Ok(session) => {
                self.ensure_profile(&session.user);
                true
            }
            Err(e) => self.report_auth(&e),
        }
    }

    /// Provider sign-in. A cancelled popup shows nothing.
    pub fn sign_in_with_provider(&self, provider: Provider, popup: &dyn PopupFlow) -> SignInOutcome {
        let outcome = self.auth.sign_in_with_provider(provider, popup);
        match &outcome {
            SignInOutcome::SignedIn(session) => self.ensure_profile(&session.user),
            SignInOutcome::Failed(message) => {
                let _ = self.notifications.error(message.clone());
            }
            SignInOutcome::Cancelled => {}
        }
        outcome
    }

    /// Sign out, dropping any persisted demo session.
    pub fn sign_out(&self) {
        self.auth.sign_out();
        if self.settings.auth.mock_mode {
            if let Err(e) = self.storage.set_mock_session(None) {
                warn!(error = %e, "failed to clear demo session");
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Task actions
    // ─────────────────────────────────────────────────────────────────────

    /// Live feed of the signed-in user's tasks (idle when signed out).
    pub fn open_feed(&self, filter: StatusFilter) -> TaskFeed {
        TaskFeed::open(self.tasks.clone(), self.owner(), filter)
    }

    /// Create a task for the signed-in user.
    pub fn create_task(&self, new: NewTask) -> Option<Task> {
        let owner = self.require_owner()?;
        match self.tasks.create_task(&owner, new) {
            Ok(task) => {
                self.record_activity(&owner, 1, 0);
                Some(task)
            }
            Err(e) => {
                self.report_task(TaskAction::Create, &e);
                None
            }
        }
    }

    /// Patch a task. Returns whether it succeeded.
    pub fn update_task(&self, id: &DocumentId, patch: TaskPatch) -> bool {
        let completed = patch.status == Some(TaskStatus::Done);
        match self.tasks.update_task(id, patch) {
            Ok(()) => {
                if completed {
                    self.record_completion();
                }
                true
            }
            Err(e) => {
                self.report_task(TaskAction::Update, &e);
                false
            }
        }
    }

    /// Advance a task's status.
    pub fn toggle_status(&self, id: &DocumentId, current: TaskStatus) -> Option<TaskStatus> {
        match self.tasks.toggle_status(id, current) {
            Ok(next) => {
                if next == TaskStatus::Done {
                    self.record_completion();
                }
                Some(next)
            }
            Err(e) => {
                self.report_task(TaskAction::Update, &e);
                None
            }
        }
    }

    /// Delete a task. Returns whether it succeeded.
    pub fn delete_task(&self, id: &DocumentId) -> bool {
        match self.tasks.delete_task(id) {
            Ok(_) => true,
            Err(e) => {
                self.report_task(TaskAction::Delete, &e);
                false
            }
        }
    }

    /// Drop a card on the board.
    pub fn drop_card(
        &self,
        board: &mut KanbanBoard,
        id: &DocumentId,
        target: TaskStatus,
        index: usize,
    ) -> Option<DropOutcome> {
        match board.drop_task(&self.tasks, id, target, index) {
            Ok(outcome) => {
                if matches!(outcome, DropOutcome::Moved { to: TaskStatus::Done, .. }) {
                    self.record_completion();
                }
                Some(outcome)
            }
            Err(e) => {
                self.report_task(TaskAction::Update, &e);
                None
            }
        }
    }

    /// Tear down. Equivalent to dropping the context.
    pub fn shutdown(self) {
        info!("app context shut down");
    }

    fn owner(&self) -> Option<UserId> {
        self.auth.current_user().map(|u| u.uid)
    }

    fn require_owner(&self) -> Option<UserId> {
        let owner = self.owner();
        if owner.is_none() {
            let _ = self.notifications.error(AuthError::NotSignedIn.user_message());
        }
        owner
    }

    /// Create or touch the profile before the sign-in action returns.
    fn ensure_profile(&self, user: &AuthUser) {
        if let Err(e) = self.profiles.ensure_profile(user) {
            warn!(uid = %user.uid, error = %e, "failed to prepare profile");
        }
    }

    fn record_completion(&self) {
        if let Some(owner) = self.owner() {
            self.record_activity(&owner, 0, 1);
        }
    }

    fn record_activity(&self, owner: &UserId, created: u64, completed: u64) {
        if let Err(e) = self.profiles.record_activity(owner, created, completed) {
            warn!(owner = %owner, error = %e, "failed to update profile stats");
        }
    }

    fn report_task(&self, action: TaskAction, err: &TaskError) {
        error!(action = ?action, error = %err, "task action failed");
        let message = match err {
            TaskError::Validation(reason) => format!("{}: {reason}", action.failure_message()),
            _ => action.failure_message().to_string(),
        };
        let _ = self.notifications.error(message);
    }

    fn report_auth(&self, err: &AuthError) -> bool {
        warn!(error = %err, "auth action failed");
        let _ = self.notifications.error(err.user_message());
        false
    }
}

fn open_store(settings: &StoreSettings) -> Result<DocumentStore> {
    let config = ConnectionConfig {
        pool_size: settings.pool_size,
        busy_timeout_ms: settings.busy_timeout_ms,
    };
    let pool = if settings.is_in_memory() {
        connection::new_in_memory(&config)?
    } else {
        connection::new_file(&expand_home(&settings.db_path), &config)?
    };
    Ok(DocumentStore::new(pool, settings.change_buffer))
}

/// Reinstate the persisted demo session, or sign in as the demo user and
/// persist that session.
fn start_mock_session(auth: &AuthService, storage: &ClientStorage) -> Result<()> {
    if let Some(session) = storage.mock_session() {
        auth.restore_session(session);
        return Ok(());
    }
    match auth.sign_in_with_provider(Provider::Google, &DemoPopup) {
        SignInOutcome::SignedIn(session) => storage.set_mock_session(Some(&session))?,
        SignInOutcome::Cancelled => warn!("demo sign-in cancelled"),
        SignInOutcome::Failed(reason) => warn!(%reason, "demo sign-in failed"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use taskdeck_settings::AuthSettings;
    use tempfile::TempDir;

    use super::*;
    use crate::notifications::ToastKind;
    use crate::routes::Route;

    fn test_settings() -> TaskdeckSettings {
        let mut settings = TaskdeckSettings::default();
        settings.auth.password_hash_cost = 4;
        settings
    }

    fn context(settings: TaskdeckSettings) -> AppContext {
        AppContext::with_parts(
            settings,
            DocumentStore::open_in_memory().unwrap(),
            ClientStorage::in_memory(),
        )
        .unwrap()
    }

    async fn wait_for_profile(ctx: &AppContext) {
        let mut rx = ctx.watch_user();
        let _ = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| s.profile.is_some()))
            .await
            .expect("profile in time")
            .expect("context alive");
    }

    #[tokio::test]
    async fn signed_out_actions_are_refused_with_a_toast() {
        let ctx = context(test_settings());
        assert!(ctx.create_task(NewTask::titled("x")).is_none());
        let toasts = ctx.notifications().drain();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].message, "Please sign in to continue.");
        assert_eq!(ctx.navigate("/kanban"), RouteDecision::Redirect("/auth?next=/kanban".to_string()));
    }

    #[tokio::test]
    async fn task_actions_update_profile_stats() {
        let ctx = context(test_settings());
        assert!(ctx.sign_up_with_password("ann@example.com", "secret1", Some("Ann")));
        wait_for_profile(&ctx).await;

        let task = ctx.create_task(NewTask::titled("write report")).unwrap();
        assert_eq!(ctx.toggle_status(&task.id, task.status), Some(TaskStatus::InProgress));
        assert!(ctx.update_task(&task.id, TaskPatch::status(TaskStatus::Done)));

        let uid = ctx.user().uid().cloned().unwrap();
        let stats = ctx.profiles().get_profile(&uid).unwrap().unwrap().stats;
        assert_eq!((stats.tasks_created, stats.tasks_completed), (1, 1));

        assert!(ctx.delete_task(&task.id));
        assert!(ctx.notifications().list().is_empty());
        assert_eq!(ctx.navigate("/kanban"), RouteDecision::Allow(Route::Kanban));
    }

    #[tokio::test]
    async fn task_created_right_after_sign_up_is_counted() {
        let ctx = context(test_settings());
        assert!(ctx.sign_up_with_password("ann@example.com", "secret1", None));
        let _ = ctx.create_task(NewTask::titled("first")).unwrap();

        wait_for_profile(&ctx).await;
        let uid = ctx.user().uid().cloned().unwrap();
        let stats = ctx.profiles().get_profile(&uid).unwrap().unwrap().stats;
        assert_eq!(stats.tasks_created, 1);
    }

    #[tokio::test]
    async fn failures_become_error_toasts() {
        let ctx = context(test_settings());
        assert!(!ctx.sign_in_with_password("ann@example.com", "secret1"));
        assert!(ctx.sign_up_with_password("ann@example.com", "secret1", None));

        assert!(!ctx.update_task(&DocumentId::from("ghost"), TaskPatch::status(TaskStatus::Done)));
        assert!(ctx.create_task(NewTask::titled("  ")).is_none());

        let messages: Vec<_> = ctx.notifications().drain().into_iter().map(|t| t.message).collect();
        assert_eq!(
            messages,
            [
                "No account found with this email.",
                "Failed to update task",
                "Failed to create task: title is required",
            ]
        );
    }

    #[tokio::test]
    async fn board_drop_persists_and_reports() {
        let ctx = context(test_settings());
        assert!(ctx.sign_up_with_password("ann@example.com", "secret1", None));
        let task = ctx.create_task(NewTask::titled("card")).unwrap();

        let mut board = KanbanBoard::from_tasks(vec![task.clone()]);
        assert_matches!(
            ctx.drop_card(&mut board, &task.id, TaskStatus::Done, 0),
            Some(DropOutcome::Moved { .. })
        );
        assert!(ctx.drop_card(&mut board, &DocumentId::from("nope"), TaskStatus::Todo, 0).is_none());
        assert_eq!(ctx.notifications().list()[0].kind, ToastKind::Error);
    }

    #[tokio::test]
    async fn feed_follows_signed_in_user() {
        let ctx = context(test_settings());
        assert!(ctx.open_feed(StatusFilter::All).owner().is_none());

        assert!(ctx.sign_up_with_password("ann@example.com", "secret1", None));
        let _ = ctx.create_task(NewTask::titled("a")).unwrap();
        let feed = ctx.open_feed(StatusFilter::All);
        let mut rx = feed.watch();
        let state = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| !s.loading))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert_eq!(state.tasks.len(), 1);
    }

    #[tokio::test]
    async fn mock_mode_persists_and_restores_demo_session() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.json");
        let settings = TaskdeckSettings {
            auth: AuthSettings {
                mock_mode: true,
                ..AuthSettings::default()
            },
            ..TaskdeckSettings::default()
        };
        let store = DocumentStore::open_in_memory().unwrap();

        let first = AppContext::with_parts(settings.clone(), store.clone(), ClientStorage::open(&path)).unwrap();
        let uid = first.auth().current_user().unwrap().uid;
        assert_eq!(first.user().provider(), Some(Provider::Google));
        first.shutdown();

        let second = AppContext::with_parts(settings, store, ClientStorage::open(&path)).unwrap();
        assert_eq!(second.auth().current_user().unwrap().uid, uid);

        second.sign_out();
        assert!(second.storage().mock_session().is_none());
    }

    #[tokio::test]
    async fn theme_falls_back_to_configured_default() {
        let mut settings = TaskdeckSettings::default();
        settings.client.default_theme = "dark".to_string();
        let ctx = context(settings);
        assert_eq!(ctx.theme(), Theme::Dark);
        ctx.storage().set_theme(Theme::Light).unwrap();
        assert_eq!(ctx.theme(), Theme::Light);
    }

    #[tokio::test]
    async fn bootstrap_from_settings() {
        let dir = TempDir::new().unwrap();
        let mut settings = TaskdeckSettings::default();
        settings.store.db_path = dir.path().join("docs.db").to_string_lossy().into_owned();
        settings.client.storage_path = dir.path().join("client.json").to_string_lossy().into_owned();
        settings.logging.level = "warn".to_string();

        let ctx = AppContext::bootstrap(settings).unwrap();
        assert!(ctx.auth().current_session().is_none());
        assert!(dir.path().join("docs.db").exists());
    }
}

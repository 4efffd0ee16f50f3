//! Signed-in user context.
//!
//! Follows the auth session stream. Each sign-in loads (or creates) the
//! user's profile; sign-out clears everything.

use std::sync::Arc;

use taskdeck_core::UserId;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::profile::{ProfileService, UserProfile};
use crate::service::AuthService;
use crate::types::{AuthUser, Provider, Session};

/// Current user and derived profile state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserState {
    /// Signed-in user.
    pub user: Option<AuthUser>,
    /// Their profile, once loaded.
    pub profile: Option<UserProfile>,
    /// Display message when the profile could not be loaded.
    pub error: Option<String>,
}

impl UserState {
    /// The signed-in user's id.
    pub fn uid(&self) -> Option<&UserId> {
        self.user.as_ref().map(|u| &u.uid)
    }

    /// Name to greet the user with: profile name, then account name, then
    /// the local part of the email, then `User`.
    pub fn display_name(&self) -> String {
        let profile_name = self.profile.as_ref().and_then(|p| p.display_name.as_deref());
        let account_name = self.user.as_ref().and_then(|u| u.display_name.as_deref());
        profile_name
            .or(account_name)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.email()
                    .and_then(|e| e.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "User".to_string())
    }

    /// The user's email.
    pub fn email(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|p| p.email.as_deref())
            .or_else(|| self.user.as_ref().and_then(|u| u.email.as_deref()))
    }

    /// How the user signed in.
    pub fn provider(&self) -> Option<Provider> {
        self.user.as_ref().map(|u| u.provider)
    }

    /// Whether the profile has a display name and an email.
    pub fn is_profile_complete(&self) -> bool {
        self.profile.as_ref().is_some_and(|p| {
            p.display_name.as_deref().is_some_and(|n| !n.trim().is_empty())
                && p.email.as_deref().is_some_and(|e| !e.is_empty())
        })
    }
}

/// Live user context bound to an [`AuthService`].
#[derive(Debug)]
pub struct UserContext {
    state: Arc<watch::Sender<UserState>>,
    task: Option<JoinHandle<()>>,
}

impl UserContext {
    /// Start following `auth`. The current session is applied before this
    /// returns. Must be called within a tokio runtime.
    pub fn start(auth: &AuthService, profiles: ProfileService) -> Self {
        let (state, _) = watch::channel(UserState::default());
        let state = Arc::new(state);

        let mut sessions = auth.subscribe();
        let initial = sessions.borrow_and_update().clone();
        apply_session(&profiles, &state, initial);

        let follower = Arc::clone(&state);
        let task = tokio::spawn(async move {
            while sessions.changed().await.is_ok() {
                let session = sessions.borrow_and_update().clone();
                apply_session(&profiles, &follower, session);
            }
            debug!("session stream closed");
        });

        Self {
            state,
            task: Some(task),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> UserState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn watch(&self) -> watch::Receiver<UserState> {
        self.state.subscribe()
    }

    /// Stop following the session stream.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for UserContext {
    fn drop(&mut self) {
        self.stop();
    }
}

fn apply_session(
    profiles: &ProfileService,
    state: &watch::Sender<UserState>,
    session: Option<Session>,
) {
    let Some(session) = session else {
        let _ = state.send_replace(UserState::default());
        return;
    };

    let user = session.user;
    let next = match profiles.ensure_profile(&user) {
        Ok(profile) => UserState {
            user: Some(user),
            profile: Some(profile),
            error: None,
        },
        Err(e) => {
            error!(uid = %user.uid, error = %e, "failed to load profile");
            UserState {
                user: Some(user),
                profile: None,
                error: Some(e.user_message().to_string()),
            }
        }
    };
    let _ = state.send_replace(next);
}

//! User profiles in the `users` collection, keyed by user id.
//!
//! A profile is created on first sign-in and merge-patched afterwards.

use serde::{Deserialize, Serialize};
use serde_json::json;
use taskdeck_core::{DocumentId, Timestamp, UserId};
use taskdeck_store::{DocumentStore, DocumentWrite, StoreError};
use tracing::{debug, info};

use crate::errors::{AuthError, Result};
use crate::types::{AuthUser, Provider};

/// Profile collection.
pub const USERS_COLLECTION: &str = "users";

/// Per-user preferences.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    /// `light`, `dark` or `system`.
    pub theme: String,
    /// Whether in-app notifications are shown.
    pub notifications: bool,
    /// View opened after sign-in (`list`, `kanban`, `calendar`).
    pub default_view: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: "system".to_string(),
            notifications: true,
            default_view: "list".to_string(),
        }
    }
}

/// Aggregate counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileStats {
    /// Tasks created.
    pub tasks_created: u64,
    /// Tasks moved to done.
    pub tasks_completed: u64,
}

/// A stored user profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Document id; equals the user id.
    pub id: DocumentId,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Email.
    #[serde(default)]
    pub email: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Sign-in provider at creation.
    #[serde(default)]
    pub provider: Provider,
    /// Preferences.
    #[serde(default)]
    pub preferences: Preferences,
    /// Counters.
    #[serde(default)]
    pub stats: ProfileStats,
    /// First sign-in.
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    /// Latest sign-in.
    #[serde(default)]
    pub last_login_at: Option<Timestamp>,
}

/// Fields a user may edit on their profile.
#[derive(Clone, Debug, Default)]
pub struct ProfilePatch {
    /// New display name.
    pub display_name: Option<String>,
    /// New avatar URL.
    pub photo_url: Option<String>,
    /// Replacement preferences.
    pub preferences: Option<Preferences>,
}

/// Reads and writes profiles.
#[derive(Clone, Debug)]
pub struct ProfileService {
    store: DocumentStore,
}

impl ProfileService {
    /// Create a service over `store`.
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Read a profile.
    pub fn get_profile(&self, uid: &UserId) -> Result<Option<UserProfile>> {
        self.store
            .get(USERS_COLLECTION, &doc_id(uid))?
            .map(|doc| doc.decode::<UserProfile>().map_err(AuthError::from))
            .transpose()
    }

    /// Fetch the profile for `user`, creating it on first sign-in, and bump
    /// `lastLoginAt`. Safe to call on every sign-in, concurrently too: an
    /// existing profile (and its counters) is never overwritten.
    pub fn ensure_profile(&self, user: &AuthUser) -> Result<UserProfile> {
        let id = doc_id(&user.uid);
        let mut write = DocumentWrite::new()
            .set("provider", user.provider.as_str())
            .set("preferences", serde_json::to_value(Preferences::default())?)
            .set("stats", serde_json::to_value(ProfileStats::default())?)
            .server_timestamp("createdAt")
            .server_timestamp("lastLoginAt");
        if let Some(name) = &user.display_name {
            write = write.set("displayName", name.as_str());
        }
        if let Some(email) = &user.email {
            write = write.set("email", email.as_str());
        }
        if let Some(url) = &user.photo_url {
            write = write.set("photoUrl", url.as_str());
        }

        if self.store.create(USERS_COLLECTION, &id, write)? {
            info!(uid = %user.uid, "profile created");
        } else {
            self.store.update(
                USERS_COLLECTION,
                &id,
                DocumentWrite::new().server_timestamp("lastLoginAt"),
            )?;
            debug!(uid = %user.uid, "profile login recorded");
        }
        self.get_profile(&user.uid)?
            .ok_or_else(|| profile_missing(&user.uid))
    }

    /// Merge editable fields into a profile.
    pub fn update_profile(&self, uid: &UserId, patch: ProfilePatch) -> Result<UserProfile> {
        let mut write = DocumentWrite::new();
        if let Some(name) = patch.display_name {
            write = write.set("displayName", name.trim());
        }
        if let Some(url) = patch.photo_url {
            write = write.set("photoUrl", url);
        }
        if let Some(preferences) = patch.preferences {
            write = write.set("preferences", serde_json::to_value(preferences)?);
        }
        let id = doc_id(uid);
        self.store.update(USERS_COLLECTION, &id, write)?;
        self.get_profile(uid)?.ok_or_else(|| profile_missing(uid))
    }

    /// Add to the profile counters.
    pub fn record_activity(&self, uid: &UserId, created: u64, completed: u64) -> Result<ProfileStats> {
        let current = self.get_profile(uid)?.ok_or_else(|| profile_missing(uid))?;
        let stats = ProfileStats {
            tasks_created: current.stats.tasks_created + created,
            tasks_completed: current.stats.tasks_completed + completed,
        };
        self.store.update(
            USERS_COLLECTION,
            &doc_id(uid),
            DocumentWrite::new().set(
                "stats",
                json!({"tasksCreated": stats.tasks_created, "tasksCompleted": stats.tasks_completed}),
            ),
        )?;
        Ok(stats)
    }
}

fn doc_id(uid: &UserId) -> DocumentId {
    DocumentId::from(uid.as_str())
}

fn profile_missing(uid: &UserId) -> AuthError {
    StoreError::not_found(USERS_COLLECTION, uid).into()
}

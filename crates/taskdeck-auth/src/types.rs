//! Auth types.

use serde::{Deserialize, Serialize};
use taskdeck_core::{Timestamp, UserId};

/// How a user signed in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Email and password.
    #[default]
    Password,
    /// Google popup.
    Google,
    /// GitHub popup.
    GitHub,
}

impl Provider {
    /// Stored string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Google => "google",
            Self::GitHub => "github",
        }
    }

    /// Whether this provider signs in through a popup.
    pub fn is_oauth(self) -> bool {
        !matches!(self, Self::Password)
    }
}

/// The signed-in account as the auth service reports it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    /// Stable user id; tasks are owned by this.
    pub uid: UserId,
    /// Email, when the provider shares one.
    #[serde(default)]
    pub email: Option<String>,
    /// Display name, when known.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Sign-in method.
    #[serde(default)]
    pub provider: Provider,
}

/// An active session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// The user.
    pub user: AuthUser,
    /// When the session started.
    pub signed_in_at: Timestamp,
}

impl Session {
    /// Start a session for `user` now.
    pub fn start(user: AuthUser) -> Self {
        Self {
            user,
            signed_in_at: Timestamp::now(),
        }
    }
}

/// Result of a popup sign-in.
#[derive(Clone, Debug, PartialEq)]
pub enum SignInOutcome {
    /// Signed in.
    SignedIn(Session),
    /// The user closed or superseded the popup. Not an error.
    Cancelled,
    /// Sign-in failed; the message is ready for display.
    Failed(String),
}

impl SignInOutcome {
    /// The session, if signed in.
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::SignedIn(session) => Some(session),
            _ => None,
        }
    }
}

/// Identity returned by a completed provider popup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PopupIdentity {
    /// The provider's own id for the account.
    pub provider_uid: String,
    /// Email shared by the provider.
    pub email: Option<String>,
    /// Display name shared by the provider.
    pub display_name: Option<String>,
    /// Avatar URL shared by the provider.
    pub photo_url: Option<String>,
}

//! Auth error types.
//!
//! Sign-in failures carry an [`AuthErrorCode`] in the `auth/...` namespace;
//! [`AuthErrorCode::message`] is the sentence shown to the user.

use taskdeck_store::StoreError;

/// Provider error codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthErrorCode {
    /// Malformed email address.
    InvalidEmail,
    /// No account for the email.
    UserNotFound,
    /// Password did not match.
    WrongPassword,
    /// Sign-up with an email that already has an account.
    EmailAlreadyInUse,
    /// Password shorter than the configured minimum.
    WeakPassword,
    /// Too many attempts.
    TooManyRequests,
    /// The provider could not be reached.
    NetworkRequestFailed,
    /// The user closed the popup.
    PopupClosedByUser,
    /// A newer popup superseded this one.
    CancelledPopupRequest,
    /// The popup could not be opened.
    PopupBlocked,
    /// The email is already registered with another sign-in method.
    AccountExistsWithDifferentCredential,
    /// The provider returned an unusable credential.
    InvalidCredential,
    /// The provider is disabled.
    OperationNotAllowed,
}

impl AuthErrorCode {
    /// The `auth/...` code string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidEmail => "auth/invalid-email",
            Self::UserNotFound => "auth/user-not-found",
            Self::WrongPassword => "auth/wrong-password",
            Self::EmailAlreadyInUse => "auth/email-already-in-use",
            Self::WeakPassword => "auth/weak-password",
            Self::TooManyRequests => "auth/too-many-requests",
            Self::NetworkRequestFailed => "auth/network-request-failed",
            Self::PopupClosedByUser => "auth/popup-closed-by-user",
            Self::CancelledPopupRequest => "auth/cancelled-popup-request",
            Self::PopupBlocked => "auth/popup-blocked",
            Self::AccountExistsWithDifferentCredential => {
                "auth/account-exists-with-different-credential"
            }
            Self::InvalidCredential => "auth/invalid-credential",
            Self::OperationNotAllowed => "auth/operation-not-allowed",
        }
    }

    /// Parse a code string.
    pub fn parse(code: &str) -> Option<Self> {
        Some(match code {
            "auth/invalid-email" => Self::InvalidEmail,
            "auth/user-not-found" => Self::UserNotFound,
            "auth/wrong-password" => Self::WrongPassword,
            "auth/email-already-in-use" => Self::EmailAlreadyInUse,
            "auth/weak-password" => Self::WeakPassword,
            "auth/too-many-requests" => Self::TooManyRequests,
            "auth/network-request-failed" => Self::NetworkRequestFailed,
            "auth/popup-closed-by-user" => Self::PopupClosedByUser,
            "auth/cancelled-popup-request" => Self::CancelledPopupRequest,
            "auth/popup-blocked" => Self::PopupBlocked,
            "auth/account-exists-with-different-credential" => {
                Self::AccountExistsWithDifferentCredential
            }
            "auth/invalid-credential" => Self::InvalidCredential,
            "auth/operation-not-allowed" => Self::OperationNotAllowed,
            _ => return None,
        })
    }

    /// Human-readable message.
    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidEmail => "Please enter a valid email address.",
            Self::UserNotFound => "No account found with this email.",
            Self::WrongPassword => "Incorrect password. Please try again.",
            Self::EmailAlreadyInUse => "An account with this email already exists.",
            Self::WeakPassword => "Password is too weak. Please choose a longer password.",
            Self::TooManyRequests => "Too many attempts. Please try again later.",
            Self::NetworkRequestFailed => "Network error. Check your connection and try again.",
            Self::PopupClosedByUser => "Sign-in popup was closed before completing.",
            Self::CancelledPopupRequest => "Sign-in was cancelled.",
            Self::PopupBlocked => "Sign-in popup was blocked by the browser.",
            Self::AccountExistsWithDifferentCredential => {
                "An account already exists with this email using a different sign-in method."
            }
            Self::InvalidCredential => "Invalid credentials. Please try again.",
            Self::OperationNotAllowed => "This sign-in method is not enabled.",
        }
    }

    /// Whether the code means the user backed out rather than failed.
    pub fn is_cancellation(self) -> bool {
        matches!(self, Self::PopupClosedByUser | Self::CancelledPopupRequest)
    }
}

/// Message for an arbitrary code string, with a generic fallback.
pub fn message_for_code(code: &str) -> &'static str {
    AuthErrorCode::parse(code).map_or("Authentication failed. Please try again.", AuthErrorCode::message)
}

/// Errors that can occur during authentication operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The provider rejected the request.
    #[error("{}: {}", .0.as_str(), .0.message())]
    Provider(AuthErrorCode),

    /// Credential or profile storage failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Password hashing failed.
    #[error("Password hash error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    /// The operation needs a signed-in user.
    #[error("not signed in")]
    NotSignedIn,
}

impl AuthError {
    /// The message to show for this error.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Provider(code) => code.message(),
            Self::NotSignedIn => "Please sign in to continue.",
            Self::Store(_) | Self::Json(_) | Self::Hash(_) => "Authentication failed. Please try again.",
        }
    }

    /// The provider code, if this is a provider rejection.
    pub fn code(&self) -> Option<AuthErrorCode> {
        match self {
            Self::Provider(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<AuthErrorCode> for AuthError {
    fn from(code: AuthErrorCode) -> Self {
        Self::Provider(code)
    }
}

/// Convenience type alias.
pub type Result<T> = std::result::Result<T, AuthError>;

//! # taskdeck-auth
//!
//! Authentication and user identity.
//!
//! - [`AuthService`]: email/password accounts, provider popups, password
//!   reset requests, and the session stream
//! - [`ProfileService`]: `users` collection profiles, created on first sign-in
//! - [`UserContext`]: follows the session stream and exposes display helpers
//!
//! Sign-in failures carry `auth/...` codes mapped to display messages by
//! [`AuthErrorCode::message`].

#![deny(unsafe_code)]

pub mod context;
pub mod errors;
pub mod password;
pub mod popup;
pub mod profile;
pub mod service;
pub mod types;

pub use context::{UserContext, UserState};
pub use errors::{AuthError, AuthErrorCode, Result, message_for_code};
pub use popup::{DemoPopup, PopupFlow};
pub use profile::{Preferences, ProfilePatch, ProfileService, ProfileStats, USERS_COLLECTION, UserProfile};
pub use service::{AuthService, CREDENTIALS_COLLECTION, PASSWORD_RESETS_COLLECTION};
pub use types::{AuthUser, PopupIdentity, Provider, Session, SignInOutcome};

//! # taskdeck-app
//!
//! The application shell around the task and auth crates.
//!
//! [`AppContext`] is created once at startup from [`TaskdeckSettings`]
//! (logging, document store, client storage, optional demo session) and
//! handed to whatever renders the UI. It exposes:
//!
//! - task actions that report failures as [`Toast`]s
//! - live feeds and board drops for the signed-in user
//! - the route guard ([`guard`]) that sends signed-out visitors to `/auth`
//! - per-device preferences in [`ClientStorage`]
//!
//! [`TaskdeckSettings`]: taskdeck_settings::TaskdeckSettings

#![deny(unsafe_code)]

pub mod client_storage;
pub mod context;
pub mod errors;
pub mod notifications;
pub mod routes;

pub use client_storage::{ClientStorage, SavedView, Theme, keys};
pub use context::AppContext;
pub use errors::{AppError, ClientStorageError, Result};
pub use notifications::{Notifications, Toast, ToastKind};
pub use routes::{Route, RouteDecision, after_sign_in, guard, next_param};

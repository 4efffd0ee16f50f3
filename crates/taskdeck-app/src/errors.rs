//! Application error types.

use taskdeck_auth::AuthError;
use taskdeck_settings::SettingsError;
use taskdeck_store::StoreError;
use taskdeck_tasks::TaskError;
use thiserror::Error;

/// Errors from the client-side key-value file.
#[derive(Debug, Error)]
pub enum ClientStorageError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while building or driving the application context.
#[derive(Debug, Error)]
pub enum AppError {
    /// Settings could not be loaded or were invalid.
    #[error("settings: {0}")]
    Settings(#[from] SettingsError),

    /// The document store could not be opened.
    #[error("store: {0}")]
    Store(#[from] StoreError),

    /// A task operation failed.
    #[error("tasks: {0}")]
    Task(#[from] TaskError),

    /// An auth operation failed.
    #[error("auth: {0}")]
    Auth(#[from] AuthError),

    /// Client storage failed.
    #[error("client storage: {0}")]
    Storage(#[from] ClientStorageError),
}

/// Convenience type alias.
pub type Result<T> = std::result::Result<T, AppError>;

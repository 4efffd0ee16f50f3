//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` to match the JSON
//! settings file. Each type implements [`Default`] with production values, and
//! `#[serde(default)]` lets a partial file fill in the rest.

mod auth;
mod client;
mod store;

pub use auth::*;
pub use client::*;
pub use store::*;

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// Loaded from `~/.taskdeck/settings.json` with defaults applied for missing
/// fields. Environment variables can override specific values.
///
/// ```json
/// {
///   "store": { "dbPath": "/var/lib/taskdeck/docs.db" },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskdeckSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Document store location and pool sizing.
    pub store: StoreSettings,
    /// Sign-in rules and enabled identity providers.
    pub auth: AuthSettings,
    /// Client-side key-value storage.
    pub client: ClientSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for TaskdeckSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "taskdeck".to_string(),
            store: StoreSettings::default(),
            auth: AuthSettings::default(),
            client: ClientSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of the compact human format.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

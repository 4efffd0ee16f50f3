//! Client-side storage settings.

use serde::{Deserialize, Serialize};

/// Local key-value storage for per-device state (theme, sidebar, saved views).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Path of the JSON key-value file.
    pub storage_path: String,
    /// Theme used when nothing has been stored yet (`light`, `dark`, `system`).
    pub default_theme: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            storage_path: "~/.taskdeck/client.json".to_string(),
            default_theme: "system".to_string(),
        }
    }
}

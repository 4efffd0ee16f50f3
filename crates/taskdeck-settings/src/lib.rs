//! # taskdeck-settings
//!
//! Configuration management with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`TaskdeckSettings::default()`]
//! 2. **User file**: `~/.taskdeck/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `TASKDECK_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    data_dir, deep_merge, expand_home, load_settings, load_settings_from_path, settings_path,
};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<TaskdeckSettings> = OnceLock::new();

/// Get the process-wide settings.
///
/// On first call, loads `~/.taskdeck/settings.json` with env var overrides,
/// falling back to compiled defaults if loading fails.
pub fn get_settings() -> &'static TaskdeckSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            TaskdeckSettings::default()
        })
    })
}

/// Initialize the process-wide settings with a specific value.
///
/// Returns the settings back if they were already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: TaskdeckSettings) -> std::result::Result<(), TaskdeckSettings> {
    SETTINGS.set(settings)
}
